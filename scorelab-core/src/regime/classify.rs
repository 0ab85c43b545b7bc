//! Trend and volatility classification of the broad market at one date.
//!
//! Trend is index close versus its simple moving average; volatility is the
//! volatility-index level bucketed into bands. The pair maps onto a
//! [`MarketRegime`] with a confidence and a scorer-weight triple.

use crate::domain::MarketRegime;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Index/volatility inputs and classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSettings {
    pub index_ticker: String,
    pub volatility_ticker: String,
    /// Bars in the index moving average.
    pub ma_period: usize,
    /// Volatility strictly below this is the low band.
    pub low_volatility: f64,
    /// Volatility strictly above this is the high band.
    pub high_volatility: f64,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        Self {
            index_ticker: "SPY".to_string(),
            volatility_ticker: "^VIX".to_string(),
            ma_period: 50,
            low_volatility: 20.0,
            high_volatility: 30.0,
        }
    }
}

impl RegimeSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.index_ticker.trim().is_empty() || self.volatility_ticker.trim().is_empty() {
            return Err("regime tickers must not be empty".to_string());
        }
        if self.ma_period < 2 {
            return Err(format!("regime.ma_period must be at least 2, got {}", self.ma_period));
        }
        if !(self.low_volatility > 0.0 && self.low_volatility <= self.high_volatility) {
            return Err(format!(
                "regime volatility bands must satisfy 0 < low <= high, got {} / {}",
                self.low_volatility, self.high_volatility
            ));
        }
        Ok(())
    }

    pub fn band(&self, volatility: f64) -> VolatilityBand {
        if volatility < self.low_volatility {
            VolatilityBand::Low
        } else if volatility > self.high_volatility {
            VolatilityBand::High
        } else {
            VolatilityBand::Moderate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityBand {
    Low,
    Moderate,
    High,
}

/// Relative weight upstream scorers should give each signal family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeights {
    pub pattern: f64,
    pub momentum: f64,
    pub fundamental: f64,
}

impl RegimeWeights {
    const fn new(pattern: f64, momentum: f64, fundamental: f64) -> Self {
        Self {
            pattern,
            momentum,
            fundamental,
        }
    }

    pub fn for_regime(regime: MarketRegime) -> Self {
        match regime {
            MarketRegime::Bull => Self::new(0.40, 0.40, 0.20),
            MarketRegime::CautiousBull => Self::new(0.35, 0.30, 0.35),
            MarketRegime::Bear => Self::new(0.20, 0.20, 0.60),
            MarketRegime::Choppy => Self::new(0.30, 0.20, 0.50),
            MarketRegime::Unknown => Self::new(0.40, 0.30, 0.30),
        }
    }
}

/// Decision table. Returns the regime and its confidence.
pub fn decide(trend: Trend, band: VolatilityBand) -> (MarketRegime, f64) {
    match (trend, band) {
        (Trend::Up, VolatilityBand::Low) => (MarketRegime::Bull, 0.8),
        (Trend::Down, VolatilityBand::High) => (MarketRegime::Bear, 0.8),
        (Trend::Up, VolatilityBand::Moderate) => (MarketRegime::CautiousBull, 0.6),
        (Trend::Down, VolatilityBand::Moderate | VolatilityBand::Low) => {
            (MarketRegime::Choppy, 0.6)
        }
        // Uptrend into a volatility spike.
        (Trend::Up, VolatilityBand::High) => (MarketRegime::Choppy, 0.3),
    }
}

pub fn describe(regime: MarketRegime) -> &'static str {
    match regime {
        MarketRegime::Bull => "Uptrend with low volatility; momentum and patterns favored",
        MarketRegime::CautiousBull => "Uptrend with elevated volatility; balanced weighting",
        MarketRegime::Bear => "Downtrend with high volatility; fundamentals favored",
        MarketRegime::Choppy => "No clear trend; fundamentals favored, momentum discounted",
        MarketRegime::Unknown => "Regime inputs unavailable; default weighting",
    }
}

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// One date's classification, as cached and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSnapshot {
    pub date: NaiveDate,
    pub regime: MarketRegime,
    pub confidence: f64,
    pub weights: RegimeWeights,
    pub description: String,
    pub index_close: Option<f64>,
    pub index_ma: Option<f64>,
    pub volatility: Option<f64>,
}

impl RegimeSnapshot {
    pub fn classify(
        date: NaiveDate,
        index_close: f64,
        index_ma: f64,
        volatility: f64,
        settings: &RegimeSettings,
    ) -> Self {
        let trend = if index_close > index_ma {
            Trend::Up
        } else {
            Trend::Down
        };
        let (regime, confidence) = decide(trend, settings.band(volatility));
        Self {
            date,
            regime,
            confidence,
            weights: RegimeWeights::for_regime(regime),
            description: describe(regime).to_string(),
            index_close: Some(index_close),
            index_ma: Some(index_ma),
            volatility: Some(volatility),
        }
    }

    /// Fallback when the inputs could not be read.
    pub fn unknown(date: NaiveDate) -> Self {
        Self {
            date,
            regime: MarketRegime::Unknown,
            confidence: 0.0,
            weights: RegimeWeights::for_regime(MarketRegime::Unknown),
            description: describe(MarketRegime::Unknown).to_string(),
            index_close: None,
            index_ma: None,
            volatility: None,
        }
    }
}
