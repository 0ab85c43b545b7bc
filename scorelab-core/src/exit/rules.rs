//! Exit thresholds and the price window a simulation needs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Thresholds of the exit state machine.
///
/// The evaluation order is fixed in [`super::ExitScanner`]; only the levels
/// are tunable. Defaults reproduce the production rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    /// Initial stop as a multiple of the entry price.
    pub initial_stop_ratio: f64,
    /// Unrealized gain (percent) that arms the trailing stop.
    pub trailing_arm_gain_pct: f64,
    /// Stop level after arming, as a multiple of the entry price.
    pub trailing_stop_ratio: f64,
    /// Bars in the moving average used by the MA-break exit.
    pub ma_period: usize,
    /// Exit when close falls below this fraction of the moving average.
    pub ma_break_ratio: f64,
    /// Unrealized gain (percent) that takes profit.
    pub profit_target_pct: f64,
    /// Extra trading days fetched beyond the hold period.
    pub lookahead_buffer_bars: u32,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            initial_stop_ratio: 0.92,
            trailing_arm_gain_pct: 15.0,
            trailing_stop_ratio: 1.12,
            ma_period: 10,
            ma_break_ratio: 0.98,
            profit_target_pct: 20.0,
            lookahead_buffer_bars: 20,
        }
    }
}

impl ExitRules {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("initial_stop_ratio", self.initial_stop_ratio),
            ("trailing_arm_gain_pct", self.trailing_arm_gain_pct),
            ("trailing_stop_ratio", self.trailing_stop_ratio),
            ("ma_break_ratio", self.ma_break_ratio),
            ("profit_target_pct", self.profit_target_pct),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("exit_rules.{name} must be a positive number, got {value}"));
            }
        }
        if self.ma_period < 2 {
            return Err(format!(
                "exit_rules.ma_period must be at least 2, got {}",
                self.ma_period
            ));
        }
        Ok(())
    }

    /// Calendar range to request so that `hold_period + lookahead_buffer_bars`
    /// trading days after `entry` are covered.
    pub fn fetch_window(&self, entry: NaiveDate, hold_period: u32) -> (NaiveDate, NaiveDate) {
        let trading_days = hold_period.saturating_add(self.lookahead_buffer_bars);
        // 5 trading days per 7 calendar days, plus slack for market holidays.
        let calendar_days = trading_days.saturating_mul(7).div_ceil(5) + 10;
        (entry, entry + chrono::Duration::days(i64::from(calendar_days)))
    }
}
