//! Per-date regime cache.
//!
//! A classification for a past date never changes, so entries are kept for
//! the life of the cache and can be persisted to a JSON file between runs.
//! Only successful classifications are stored.

use super::classify::RegimeSnapshot;
use super::RegimeError;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct RegimeCache {
    entries: RwLock<BTreeMap<NaiveDate, Arc<RegimeSnapshot>>>,
}

impl RegimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<Arc<RegimeSnapshot>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&date)
            .cloned()
    }

    /// Store a snapshot under its date. If a concurrent caller already stored
    /// one, that entry is kept and returned.
    pub fn insert(&self, snapshot: RegimeSnapshot) -> Arc<RegimeSnapshot> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            entries
                .entry(snapshot.date)
                .or_insert_with(|| Arc::new(snapshot)),
        )
    }

    /// Cached snapshot for `date`, or the result of `compute`, which is stored
    /// only when it succeeds.
    pub fn get_or_try_insert_with<F>(
        &self,
        date: NaiveDate,
        compute: F,
    ) -> Result<Arc<RegimeSnapshot>, RegimeError>
    where
        F: FnOnce() -> Result<RegimeSnapshot, RegimeError>,
    {
        if let Some(hit) = self.get(date) {
            return Ok(hit);
        }
        compute().map(|snapshot| self.insert(snapshot))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a cache written by [`RegimeCache::save`]. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, RegimeError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read_to_string(path)?;
        let snapshots: Vec<RegimeSnapshot> = serde_json::from_str(&raw)?;
        let entries = snapshots
            .into_iter()
            .map(|s| (s.date, Arc::new(s)))
            .collect();
        tracing::debug!(path = %path.display(), "loaded regime cache");
        Ok(Self {
            entries: RwLock::new(entries),
        })
    }

    /// Write all entries as a JSON array, via a temporary file and rename.
    pub fn save(&self, path: &Path) -> Result<(), RegimeError> {
        let snapshots: Vec<RegimeSnapshot> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|s| s.as_ref().clone())
            .collect();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&snapshots)?)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), entries = snapshots.len(), "saved regime cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::RegimeSettings;

    fn snap(day: u32) -> RegimeSnapshot {
        let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        RegimeSnapshot::classify(date, 510.0, 500.0, 14.0, &RegimeSettings::default())
    }

    #[test]
    fn repeat_lookups_share_one_snapshot() {
        let cache = RegimeCache::new();
        let first = cache.get_or_try_insert_with(snap(1).date, || Ok(snap(1))).unwrap();
        let second = cache
            .get_or_try_insert_with(snap(1).date, || panic!("must not recompute"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = RegimeCache::new();
        let date = snap(2).date;
        let err = cache.get_or_try_insert_with(date, || {
            Err(RegimeError::NoVolatilityReading {
                symbol: "^VIX".into(),
                date,
            })
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
        assert!(cache.get_or_try_insert_with(date, || Ok(snap(2))).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("regime.json");
        let cache = RegimeCache::new();
        cache.insert(snap(1));
        cache.insert(snap(2));
        cache.save(&path).unwrap();

        let reloaded = RegimeCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(snap(2).date).as_deref(), Some(&snap(2)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegimeCache::load(&dir.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }
}
