//! ScoreLab Core: domain types, price data, exit engine, market-regime gate.
//!
//! This crate holds everything below the portfolio level:
//! - Domain types (price bars, candidates, trades, regimes)
//! - Price providers: Yahoo Finance, synthetic, Parquet snapshots, read-through cache
//! - Exit-rule state machine that turns one candidate into one closed trade
//! - Market-regime classification with a per-date cache

pub mod data;
pub mod domain;
pub mod exit;
pub mod regime;
