//! Backtest orchestration: reference date, regime gate, simulation, report.

use crate::candidates::{CandidateError, CandidateTable};
use crate::config::{BacktestConfig, ConfigError, RegimePolicy};
use crate::metrics::{EmptyReason, PortfolioReport, SkipSummary};
use crate::simulator::{DroppedCandidate, Simulator};
use chrono::{Duration, NaiveDate};
use scorelab_core::data::PriceProvider;
use scorelab_core::domain::Trade;
use scorelab_core::regime::{RegimeCache, RegimeError, RegimeGate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no candidates to backtest")]
    NoCandidates,

    #[error("invalid reference date '{input}': {reason}")]
    InvalidReferenceDate { input: String, reason: String },

    #[error("market regime unavailable: {0}")]
    RegimeUnavailable(#[source] RegimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Candidates(#[from] CandidateError),
}

/// When the simulated entries happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceDate {
    On(NaiveDate),
    DaysAgo(u32),
}

impl ReferenceDate {
    /// Resolve against `today`. Dates after `today` are rejected.
    pub fn resolve(self, today: NaiveDate) -> Result<NaiveDate, RunError> {
        match self {
            ReferenceDate::On(date) if date > today => Err(RunError::InvalidReferenceDate {
                input: date.to_string(),
                reason: format!("after today ({today})"),
            }),
            ReferenceDate::On(date) => Ok(date),
            ReferenceDate::DaysAgo(days) => today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .ok_or_else(|| RunError::InvalidReferenceDate {
                    input: format!("{days} days ago"),
                    reason: "out of calendar range".to_string(),
                }),
        }
    }
}

impl FromStr for ReferenceDate {
    type Err = RunError;

    /// Accepts `YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(ReferenceDate::On)
            .map_err(|e| RunError::InvalidReferenceDate {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Shared services for one run.
pub struct RunContext<'a> {
    pub provider: &'a dyn PriceProvider,
    pub regime_cache: &'a RegimeCache,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    pub report: PortfolioReport,
    pub trades: Vec<Trade>,
    pub dropped: Vec<DroppedCandidate>,
}

/// Run one backtest over `table` as configured by `config`.
///
/// Only an empty table, a bad reference date, or a regime failure under
/// [`RegimePolicy::FailFast`] abort the run. Per-candidate problems are
/// counted in the report's skip summary.
pub fn run_backtest(
    table: &CandidateTable,
    config: &BacktestConfig,
    ctx: &RunContext<'_>,
) -> Result<BacktestRun, RunError> {
    if table.candidates.is_empty() {
        return Err(RunError::NoCandidates);
    }
    let reference_date = config.backtest.reference().resolve(ctx.today)?;

    let gate = RegimeGate::new(ctx.provider, ctx.regime_cache, &config.regime.settings);
    let snapshot = match config.backtest.regime_policy {
        RegimePolicy::Fallback => gate.classify(reference_date),
        RegimePolicy::FailFast => gate
            .try_classify(reference_date)
            .map_err(RunError::RegimeUnavailable)?,
    };
    let regime = snapshot.regime;
    tracing::info!(
        %reference_date,
        regime = %regime,
        confidence = snapshot.confidence,
        candidates = table.candidates.len(),
        "starting backtest"
    );

    let invalid = SkipSummary {
        invalid: table.rejected.len(),
        ..SkipSummary::default()
    };

    if config.backtest.respect_regime_gate && regime.blocks_entries() {
        tracing::info!(regime = %regime, "regime gate closed, no entries simulated");
        let mut report = PortfolioReport::empty(EmptyReason::RegimeFilter(regime));
        report.market_regime = regime;
        report.regime_metadata = Some(snapshot.as_ref().clone());
        report.reference_date = Some(reference_date);
        report.skipped = invalid;
        return Ok(BacktestRun {
            report,
            trades: Vec::new(),
            dropped: Vec::new(),
        });
    }

    let simulator = Simulator::new(ctx.provider, &config.exit_rules, config.data.max_concurrency);
    let outcome = simulator.run(
        &table.candidates,
        reference_date,
        config.backtest.min_score,
        regime,
    );

    let mut report = PortfolioReport::from_trades(&outcome.trades);
    report.market_regime = regime;
    report.regime_metadata = Some(snapshot.as_ref().clone());
    report.reference_date = Some(reference_date);
    report.skipped = SkipSummary {
        invalid: invalid.invalid,
        ..outcome.skipped
    };
    if report.total_trades == 0 {
        report.reason = Some(if outcome.qualifying() == 0 {
            EmptyReason::NoQualifyingCandidates
        } else {
            EmptyReason::NoData
        });
    }

    tracing::info!(
        trades = report.total_trades,
        win_rate = report.win_rate,
        profit_factor = %report.profit_factor,
        skipped = report.skipped.total(),
        "backtest complete"
    );

    Ok(BacktestRun {
        report,
        trades: outcome.trades,
        dropped: outcome.dropped,
    })
}
