//! Exit-rule engine: simulate one position from entry to its first exit.

mod rules;
mod scanner;

pub use rules::ExitRules;
pub use scanner::ExitScanner;

use crate::domain::{bar, Candidate, ExitReason, MarketRegime, PriceBar, Trade, TradeLegs};
use chrono::NaiveDate;
use thiserror::Error;

/// Why a candidate produced no trade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoTrade {
    /// Nothing on or after the entry date, or only the entry bar itself.
    #[error("only {available} bar(s) on or after the entry date")]
    TooFewBars { available: usize },
}

/// Simulate a long position in `candidate` entered at the close of the first
/// bar dated on or after `entry_date`.
///
/// `bars` must be sorted ascending by date. Bars before the entry are ignored
/// and the scan stops at the first exit, so no later close can influence the
/// result. A series that ends before any rule fires closes at its last bar
/// as HOLD_PERIOD, with `bars_held` short of the hold period.
pub fn simulate_trade(
    candidate: &Candidate,
    bars: &[PriceBar],
    entry_date: NaiveDate,
    rules: &ExitRules,
    regime: MarketRegime,
) -> Result<Trade, NoTrade> {
    let start = bar::first_on_or_after(bars, entry_date).unwrap_or(bars.len());
    let series = &bars[start..];
    if series.len() < 2 {
        return Err(NoTrade::TooFewBars {
            available: series.len(),
        });
    }

    let hold_period = candidate.hold_period();
    let entry = series[0];
    let mut scanner = ExitScanner::new(rules, entry.close, hold_period);
    let mut low = entry.close;
    let mut high = entry.close;

    let mut exit = None;
    for (i, b) in series.iter().enumerate().skip(1) {
        low = low.min(b.close);
        high = high.max(b.close);
        if let Some(reason) = scanner.step(b.close) {
            exit = Some((i, reason));
            break;
        }
    }
    let (exit_index, reason) = exit.unwrap_or_else(|| {
        tracing::debug!(
            ticker = %candidate.ticker,
            bars = series.len(),
            hold_period,
            "series ended before the hold period, closing at last bar"
        );
        (series.len() - 1, ExitReason::HoldPeriod)
    });

    let exit_bar = series[exit_index];
    let legs = TradeLegs {
        entry_date: entry.date,
        entry_price: entry.close,
        exit_date: exit_bar.date,
        exit_price: exit_bar.close,
        peak_price: scanner.peak_price(),
        bars_held: exit_index,
        max_drawdown_pct: (low - high) / high * 100.0,
    };
    Ok(Trade::close(
        &candidate.ticker,
        candidate.score,
        candidate.tier,
        hold_period,
        legs,
        reason,
        regime,
    ))
}
