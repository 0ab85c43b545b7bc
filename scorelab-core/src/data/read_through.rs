//! Read-through price cache.
//!
//! Lookup order for `(symbol, start, end)`:
//! 1. in-memory map (lifetime of this provider)
//! 2. Parquet snapshot on disk, if a snapshot store is configured
//! 3. upstream provider, if one is configured and available; the result is
//!    written back to both layers
//! 4. otherwise `DataError::Offline`
//!
//! Concurrent misses on the same key may both go upstream. Both writes are
//! valid and the last one wins; no further coordination is attempted.

use super::cache::ParquetCache;
use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use crate::domain::PriceBar;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type SeriesKey = (String, NaiveDate, NaiveDate);

/// Hit/miss counters, mostly for logs and tests.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub memory_hits: AtomicUsize,
    pub snapshot_hits: AtomicUsize,
    pub upstream_fetches: AtomicUsize,
}

pub struct ReadThroughProvider {
    upstream: Option<Box<dyn PriceProvider>>,
    snapshots: Option<ParquetCache>,
    memory: RwLock<HashMap<SeriesKey, Arc<Vec<PriceBar>>>>,
    stats: CacheStats,
}

impl ReadThroughProvider {
    pub fn new(upstream: Option<Box<dyn PriceProvider>>, snapshots: Option<ParquetCache>) -> Self {
        Self {
            upstream,
            snapshots,
            memory: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn remember(&self, key: SeriesKey, bars: Arc<Vec<PriceBar>>) {
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, bars);
    }

    fn result(symbol: &str, bars: &Arc<Vec<PriceBar>>, source: DataSource) -> FetchResult {
        FetchResult {
            symbol: symbol.to_string(),
            bars: bars.as_ref().clone(),
            source,
        }
    }
}

impl PriceProvider for ReadThroughProvider {
    fn name(&self) -> &str {
        "read_through"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let key = (symbol.to_string(), start, end);

        let cached = self
            .memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(bars) = cached {
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Self::result(symbol, &bars, DataSource::Cache));
        }

        if let Some(store) = &self.snapshots {
            if let Some(bars) = store.load(symbol, start, end)? {
                self.stats.snapshot_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(symbol, %start, %end, "price snapshot hit");
                let bars = Arc::new(bars);
                self.remember(key, Arc::clone(&bars));
                return Ok(Self::result(symbol, &bars, DataSource::Snapshot));
            }
        }

        let upstream = match &self.upstream {
            Some(p) if p.is_available() => p,
            Some(_) => return Err(DataError::CircuitBreakerTripped),
            None => {
                return Err(DataError::Offline {
                    symbol: symbol.to_string(),
                    start,
                    end,
                })
            }
        };

        self.stats.upstream_fetches.fetch_add(1, Ordering::Relaxed);
        let fetched = upstream.fetch(symbol, start, end)?;
        if let Some(store) = &self.snapshots {
            if let Err(e) = store.write(symbol, start, end, &fetched.bars, upstream.name()) {
                tracing::warn!(symbol, error = %e, "failed to persist price snapshot");
            }
        }
        self.remember(key, Arc::new(fetched.bars.clone()));
        Ok(fetched)
    }

    fn is_available(&self) -> bool {
        self.snapshots.is_some() || self.upstream.as_ref().is_some_and(|p| p.is_available())
    }
}
