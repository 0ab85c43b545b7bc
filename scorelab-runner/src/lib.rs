//! ScoreLab Runner: backtest orchestration, candidate ingestion, metrics.
//!
//! This crate builds on `scorelab-core` to provide:
//! - TOML configuration with defaults for every field
//! - Candidate table ingestion from CSV
//! - Portfolio simulation over a bounded thread pool
//! - Pure portfolio metrics
//! - The orchestrator that ties regime gating, simulation and reporting together

pub mod candidates;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod simulator;

pub use candidates::{load_candidates, read_candidates, CandidateError, CandidateTable, RejectedRow};
pub use config::{BacktestConfig, ConfigError, LogFormat, RegimePolicy};
pub use metrics::{EmptyReason, PortfolioReport, ProfitFactor, SkipSummary};
pub use orchestrator::{run_backtest, BacktestRun, ReferenceDate, RunContext, RunError};
pub use simulator::{DropReason, DroppedCandidate, SimulationOutcome, Simulator};
