//! Portfolio simulator: score filter, then one exit simulation per candidate.
//!
//! Candidates are independent. Price fetches dominate the cost, so they run
//! on a bounded Rayon pool; each candidate's bar scan stays sequential. A
//! candidate whose data cannot be fetched (`NoData`) or has fewer than two
//! bars from the entry onward (`InsufficientHistory`) is dropped and
//! counted, never failed.

use crate::metrics::SkipSummary;
use chrono::NaiveDate;
use rayon::prelude::*;
use scorelab_core::data::PriceProvider;
use scorelab_core::domain::{Candidate, MarketRegime, Trade};
use scorelab_core::exit::{simulate_trade, ExitRules, NoTrade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    BelowThreshold,
    NoData,
    InsufficientHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedCandidate {
    pub ticker: String,
    pub reason: DropReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    /// In candidate order.
    pub trades: Vec<Trade>,
    pub dropped: Vec<DroppedCandidate>,
    pub skipped: SkipSummary,
}

impl SimulationOutcome {
    /// Candidates that cleared the score threshold.
    pub fn qualifying(&self) -> usize {
        self.trades.len() + self.skipped.no_data + self.skipped.insufficient_history
    }
}

pub struct Simulator<'a> {
    provider: &'a dyn PriceProvider,
    rules: &'a ExitRules,
    max_concurrency: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(provider: &'a dyn PriceProvider, rules: &'a ExitRules, max_concurrency: usize) -> Self {
        Self {
            provider,
            rules,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Simulate every candidate scoring at least `min_score` (or its scale's
    /// default threshold), entering on the first bar at or after `entry_date`.
    pub fn run(
        &self,
        candidates: &[Candidate],
        entry_date: NaiveDate,
        min_score: Option<f64>,
        regime: MarketRegime,
    ) -> SimulationOutcome {
        let mut outcome = SimulationOutcome::default();
        let mut eligible = Vec::with_capacity(candidates.len());
        for c in candidates {
            if c.score.qualifies(min_score) {
                eligible.push(c);
            } else {
                outcome.skipped.below_threshold += 1;
                outcome.dropped.push(DroppedCandidate {
                    ticker: c.ticker.clone(),
                    reason: DropReason::BelowThreshold,
                    detail: format!("{} {} below threshold", c.score.scale.column_name(), c.score.value),
                });
            }
        }
        tracing::info!(
            eligible = eligible.len(),
            below_threshold = outcome.skipped.below_threshold,
            %entry_date,
            "simulating candidates"
        );

        let results = self.map_candidates(&eligible, |c| self.simulate_one(c, entry_date, regime));

        for result in results {
            match result {
                Ok(trade) => outcome.trades.push(trade),
                Err(dropped) => {
                    match dropped.reason {
                        DropReason::NoData => outcome.skipped.no_data += 1,
                        DropReason::InsufficientHistory => outcome.skipped.insufficient_history += 1,
                        DropReason::BelowThreshold => outcome.skipped.below_threshold += 1,
                    }
                    outcome.dropped.push(dropped);
                }
            }
        }
        outcome
    }

    fn map_candidates<F>(&self, eligible: &[&Candidate], f: F) -> Vec<Result<Trade, DroppedCandidate>>
    where
        F: Fn(&Candidate) -> Result<Trade, DroppedCandidate> + Sync,
    {
        if self.max_concurrency > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.max_concurrency)
                .build()
            {
                Ok(pool) => return pool.install(|| eligible.par_iter().map(|c| f(c)).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to build thread pool, simulating sequentially");
                }
            }
        }
        eligible.iter().map(|c| f(c)).collect()
    }

    fn simulate_one(
        &self,
        candidate: &Candidate,
        entry_date: NaiveDate,
        regime: MarketRegime,
    ) -> Result<Trade, DroppedCandidate> {
        let ticker = candidate.ticker.as_str();
        let dropped = |reason, detail: String| DroppedCandidate {
            ticker: ticker.to_string(),
            reason,
            detail,
        };

        let (start, end) = self.rules.fetch_window(entry_date, candidate.hold_period());
        let fetched = self.provider.fetch(ticker, start, end).map_err(|e| {
            tracing::warn!(ticker, error = %e, "no price data, dropping candidate");
            dropped(DropReason::NoData, e.to_string())
        })?;

        match simulate_trade(candidate, &fetched.bars, entry_date, self.rules, regime) {
            Ok(trade) => {
                tracing::debug!(
                    ticker,
                    exit_reason = %trade.exit_reason,
                    return_pct = trade.return_pct,
                    bars_held = trade.bars_held,
                    "trade closed"
                );
                Ok(trade)
            }
            Err(e @ NoTrade::TooFewBars { .. }) => {
                tracing::warn!(ticker, reason = %e, "dropping candidate");
                Err(dropped(DropReason::InsufficientHistory, e.to_string()))
            }
        }
    }
}
