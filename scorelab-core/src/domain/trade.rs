//! Trade: one closed, simulated position per candidate.

use super::candidate::{Score, Tier};
use super::regime::MarketRegime;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a simulated position was closed.
///
/// Variant order is the evaluation priority of the exit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    #[serde(rename = "BREAK_MA10")]
    BreakMa10,
    ProfitTarget,
    HoldPeriod,
}

impl ExitReason {
    pub const ALL: [ExitReason; 5] = [
        ExitReason::StopLoss,
        ExitReason::TrailingStop,
        ExitReason::BreakMa10,
        ExitReason::ProfitTarget,
        ExitReason::HoldPeriod,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::BreakMa10 => "BREAK_MA10",
            ExitReason::ProfitTarget => "PROFIT_TARGET",
            ExitReason::HoldPeriod => "HOLD_PERIOD",
        }
    }

    /// True for exits caused by a protective stop.
    pub fn is_stop(self) -> bool {
        matches!(self, ExitReason::StopLoss | ExitReason::TrailingStop)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry and exit observations gathered by the exit scan.
#[derive(Debug, Clone, Copy)]
pub struct TradeLegs {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub peak_price: f64,
    pub bars_held: usize,
    pub max_drawdown_pct: f64,
}

/// A closed simulated trade.
///
/// Built only through [`Trade::close`], which derives the return, calendar
/// hold, win flag and stop flag so they can never disagree with each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub score: Score,
    pub tier: Tier,

    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Highest close seen while the position was open.
    pub peak_price: f64,

    pub return_pct: f64,
    /// Calendar days between entry and exit.
    pub hold_days: i64,
    /// Bars elapsed between entry and exit.
    pub bars_held: usize,
    /// Bar budget the position was allowed.
    pub hold_period: u32,

    pub exit_reason: ExitReason,
    pub max_drawdown_pct: f64,
    pub market_regime: MarketRegime,
    pub win: bool,
    pub stop_triggered: bool,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        ticker: &str,
        score: Score,
        tier: Tier,
        hold_period: u32,
        legs: TradeLegs,
        exit_reason: ExitReason,
        market_regime: MarketRegime,
    ) -> Self {
        let return_pct = (legs.exit_price - legs.entry_price) / legs.entry_price * 100.0;
        Self {
            ticker: ticker.to_string(),
            score,
            tier,
            entry_date: legs.entry_date,
            exit_date: legs.exit_date,
            entry_price: legs.entry_price,
            exit_price: legs.exit_price,
            peak_price: legs.peak_price,
            return_pct,
            hold_days: (legs.exit_date - legs.entry_date).num_days(),
            bars_held: legs.bars_held,
            hold_period,
            exit_reason,
            max_drawdown_pct: legs.max_drawdown_pct,
            market_regime,
            win: return_pct > 0.0,
            stop_triggered: exit_reason.is_stop(),
        }
    }
}
