//! PriceBar: one day of OHLCV data for a single ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar. A fetched series is ordered by date and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Returns true if any price field is NaN (holiday gap or provider hole).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Index of the first bar dated on or after `date`, if any.
pub fn first_on_or_after(bars: &[PriceBar], date: NaiveDate) -> Option<usize> {
    let idx = bars.partition_point(|b| b.date < date);
    (idx < bars.len()).then_some(idx)
}

/// The prefix of `bars` dated on or before `date`.
pub fn up_to(bars: &[PriceBar], date: NaiveDate) -> &[PriceBar] {
    let end = bars.partition_point(|b| b.date <= date);
    &bars[..end]
}
