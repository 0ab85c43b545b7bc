//! Parquet snapshot store for fetched price series.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{start}_{end}.parquet`, one file per
//! requested range, with a `{start}_{end}.meta.json` sidecar.
//!
//! - Atomic writes (write to .tmp, rename into place); concurrent writers of
//!   the same key are last-write-wins and either file is valid
//! - Integrity validation on load (schema check, row count > 0, hash match)
//! - Quarantine for corrupt files (`{filename}.quarantined`)

use super::provider::DataError;
use crate::domain::PriceBar;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for one cached range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={}", sanitize(symbol)))
    }

    fn range_stem(start: NaiveDate, end: NaiveDate) -> String {
        format!("{start}_{end}")
    }

    fn data_path(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("{}.parquet", Self::range_stem(start, end)))
    }

    fn meta_path(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("{}.meta.json", Self::range_stem(start, end)))
    }

    /// Persist the bars fetched for `(symbol, start, end)`.
    pub fn write(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        bars: &[PriceBar],
        source: &str,
    ) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::CacheError("no bars to cache".into()));
        }

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut df = bars_to_dataframe(bars)?;
        let path = self.data_path(symbol, start, end);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = SnapshotMeta {
            symbol: symbol.to_string(),
            start,
            end,
            bar_count: bars.len(),
            data_hash: hash_bars(bars)?,
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(symbol, start, end);
        let tmp_meta = meta_path.with_extension("json.tmp");
        fs::write(&tmp_meta, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        fs::rename(&tmp_meta, &meta_path)
            .map_err(|e| DataError::CacheError(format!("meta rename: {e}")))?;

        Ok(())
    }

    /// Load a previously written range. `Ok(None)` if nothing is cached.
    ///
    /// A file that fails validation is quarantined and reported as a miss.
    pub fn load(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<PriceBar>>, DataError> {
        let path = self.data_path(symbol, start, end);
        if !path.exists() {
            return Ok(None);
        }

        let expected_hash = self.get_meta(symbol, start, end).map(|m| m.data_hash);
        let loaded = load_and_validate_parquet(&path).and_then(|bars| {
            if let Some(expected) = &expected_hash {
                if *expected != hash_bars(&bars)? {
                    return Err(DataError::ValidationError("data hash mismatch".into()));
                }
            }
            Ok(bars)
        });

        match loaded {
            Ok(bars) => Ok(Some(bars)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt snapshot");
                let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                Ok(None)
            }
        }
    }

    pub fn get_meta(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.meta_path(symbol, start, end)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Every snapshot sidecar in the cache, sorted by symbol then start date.
    pub fn list(&self) -> Result<Vec<SnapshotMeta>, DataError> {
        let mut metas = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(metas);
        }
        let read = |p: &Path| {
            fs::read_dir(p).map_err(|e| DataError::CacheError(format!("read dir: {e}")))
        };
        for sym_entry in read(&self.cache_dir)? {
            let sym_path = sym_entry
                .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                .path();
            if !sym_path.is_dir() {
                continue;
            }
            for entry in read(&sym_path)? {
                let path = entry
                    .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                    .path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if !is_meta {
                    continue;
                }
                if let Some(meta) = fs::read_to_string(&path)
                    .ok()
                    .and_then(|c| serde_json::from_str::<SnapshotMeta>(&c).ok())
                {
                    metas.push(meta);
                }
            }
        }
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.start.cmp(&b.start)));
        Ok(metas)
    }
}

/// Index tickers like `^VIX` are not safe in every filesystem.
fn sanitize(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

fn hash_bars(bars: &[PriceBar]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(bars)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn bars_to_dataframe(bars: &[PriceBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in ["date", "open", "high", "low", "close", "volume"] {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<PriceBar>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let typed = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let date_ca = col("date")?.date().map_err(|e| typed("date", e))?;
    let open_ca = col("open")?.f64().map_err(|e| typed("open", e))?;
    let high_ca = col("high")?.f64().map_err(|e| typed("high", e))?;
    let low_ca = col("low")?.f64().map_err(|e| typed("low", e))?;
    let close_ca = col("close")?.f64().map_err(|e| typed("close", e))?;
    let vol_ca = col("volume")?.u64().map_err(|e| typed("volume", e))?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        bars.push(PriceBar {
            date: epoch() + chrono::Duration::days(date_days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample_bars() -> Vec<PriceBar> {
        vec![
            PriceBar {
                date: d(2),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 1000,
            },
            PriceBar {
                date: d(3),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                volume: 1100,
            },
        ]
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache.write("SPY", d(1), d(5), &sample_bars(), "test").unwrap();
        let loaded = cache.load("SPY", d(1), d(5)).unwrap().unwrap();

        assert_eq!(loaded, sample_bars());
    }

    #[test]
    fn ranges_are_separate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache.write("SPY", d(1), d(5), &sample_bars(), "test").unwrap();
        assert!(cache.load("SPY", d(1), d(6)).unwrap().is_none());
        assert!(cache.load("QQQ", d(1), d(5)).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache.write("SPY", d(1), d(5), &sample_bars(), "test").unwrap();
        let path = cache.data_path("SPY", d(1), d(5));
        fs::write(&path, b"not parquet").unwrap();

        assert!(cache.load("SPY", d(1), d(5)).unwrap().is_none());
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
    }

    #[test]
    fn index_symbols_are_sanitized_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert_eq!(cache.cache_dir(), dir.path());

        cache.write("^VIX", d(1), d(5), &sample_bars(), "test").unwrap();
        cache.write("AAPL", d(1), d(5), &sample_bars(), "test").unwrap();
        assert!(dir.path().join("symbol=_VIX").is_dir());

        let metas = cache.list().unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].symbol, "AAPL");
        assert_eq!(metas[1].symbol, "^VIX");
        assert_eq!(metas[1].bar_count, 2);
    }

    #[test]
    fn empty_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(cache.write("SPY", d(1), d(5), &[], "test").is_err());
    }
}
