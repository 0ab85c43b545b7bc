//! Regime lookup through a price provider, read through a [`RegimeCache`].

use super::cache::RegimeCache;
use super::classify::{sma, RegimeSettings, RegimeSnapshot};
use super::RegimeError;
use crate::data::PriceProvider;
use crate::domain::{bar, PriceBar};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

/// Calendar days searched backwards for the latest volatility close.
const VOLATILITY_LOOKBACK_DAYS: i64 = 10;

pub struct RegimeGate<'a> {
    provider: &'a dyn PriceProvider,
    cache: &'a RegimeCache,
    settings: &'a RegimeSettings,
}

impl<'a> RegimeGate<'a> {
    pub fn new(
        provider: &'a dyn PriceProvider,
        cache: &'a RegimeCache,
        settings: &'a RegimeSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            settings,
        }
    }

    /// Classify the market at `date` using only bars dated on or before it.
    pub fn try_classify(&self, date: NaiveDate) -> Result<Arc<RegimeSnapshot>, RegimeError> {
        self.cache
            .get_or_try_insert_with(date, || self.compute(date))
    }

    /// Like [`try_classify`](Self::try_classify), falling back to `UNKNOWN`
    /// with default weights. The fallback is not cached.
    pub fn classify(&self, date: NaiveDate) -> Arc<RegimeSnapshot> {
        match self.try_classify(date) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(%date, error = %e, "regime unavailable, falling back to UNKNOWN");
                Arc::new(RegimeSnapshot::unknown(date))
            }
        }
    }

    fn compute(&self, date: NaiveDate) -> Result<RegimeSnapshot, RegimeError> {
        let period = self.settings.ma_period;
        // Enough calendar days for `period` trading days, plus holiday slack.
        let lookback = (period * 7).div_ceil(5) + 50;
        let index = self.fetch_until(
            &self.settings.index_ticker,
            date - Duration::days(lookback as i64),
            date,
        )?;
        let closes: Vec<f64> = index.iter().map(|b| b.close).collect();
        let index_ma = sma(&closes, period).ok_or_else(|| RegimeError::InsufficientHistory {
            symbol: self.settings.index_ticker.clone(),
            date,
            needed: period,
            available: closes.len(),
        })?;
        let index_close = closes[closes.len() - 1];

        let vol_symbol = &self.settings.volatility_ticker;
        let vol = self.fetch_until(vol_symbol, date - Duration::days(VOLATILITY_LOOKBACK_DAYS), date)?;
        let volatility = vol
            .last()
            .map(|b| b.close)
            .ok_or_else(|| RegimeError::NoVolatilityReading {
                symbol: vol_symbol.clone(),
                date,
            })?;

        let snapshot = RegimeSnapshot::classify(date, index_close, index_ma, volatility, self.settings);
        tracing::info!(
            %date,
            regime = %snapshot.regime,
            confidence = snapshot.confidence,
            index_close,
            index_ma,
            volatility,
            "market regime classified"
        );
        Ok(snapshot)
    }

    /// Fetch `[start, end]` and drop anything after `end`, whatever the provider returned.
    fn fetch_until(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, RegimeError> {
        let fetched = self
            .provider
            .fetch(symbol, start, end)
            .map_err(|source| RegimeError::Data {
                symbol: symbol.to_string(),
                source,
            })?;
        Ok(bar::up_to(&fetched.bars, end)
            .iter()
            .filter(|b| b.close.is_finite())
            .copied()
            .collect())
    }
}
