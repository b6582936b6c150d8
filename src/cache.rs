//! Cache of the most recent sample per metric identity.
//!
//! The shared cache survives between scrapes and is what a scrape falls back
//! to when it cannot produce a fresh value in time. Each scrape also records
//! everything it produces into a private per-cycle cache, which is then
//! swapped in wholesale (`replace`), used to backfill (`merge`) or laid over
//! the shared entries (`overlay`).

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::sample::Sample;

/// Identities currently held by a cache.
pub type CacheIndex = HashSet<String>;

/// Concurrency-safe map of metric identity to latest sample.
#[derive(Debug, Default)]
pub struct MetricCache {
    samples: RwLock<HashMap<String, Sample>>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Sample>> {
        self.samples.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Sample>> {
        self.samples.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites by identity.
    pub fn add(&self, sample: Sample) {
        let identity = sample.identity();
        self.write().insert(identity, sample);
    }

    /// Becomes a copy of `other`.
    pub fn replace(&self, other: &MetricCache) {
        let snapshot = other.read().clone();
        *self.write() = snapshot;
    }

    /// Inserts every entry of `other` whose identity is absent here.
    pub fn merge(&self, other: &MetricCache) {
        let snapshot = other.read().clone();
        let mut samples = self.write();
        for (identity, sample) in snapshot {
            samples.entry(identity).or_insert(sample);
        }
    }

    /// Inserts or overwrites every entry of `other`, keeping entries `other`
    /// does not have.
    pub fn overlay(&self, other: &MetricCache) {
        let snapshot = other.read().clone();
        self.write().extend(snapshot);
    }

    pub fn index(&self) -> CacheIndex {
        self.read().keys().cloned().collect()
    }

    /// Point-in-time copy of every sample whose identity is not in `exclude`.
    pub fn snapshot_excluding(&self, exclude: &CacheIndex) -> Vec<Sample> {
        self.read()
            .iter()
            .filter(|(identity, _)| !exclude.contains(*identity))
            .map(|(_, sample)| sample.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::MetricDesc;
    use std::sync::Arc;

    fn sample(name: &str, value: f64) -> Sample {
        let desc = Arc::new(MetricDesc::new("pool", "size_bytes", "Total size.", &["pool"]));
        Sample::new(desc, vec![name.to_string()], value)
    }

    fn value_of(cache: &MetricCache, pool: &str) -> Option<f64> {
        cache
            .snapshot_excluding(&CacheIndex::default())
            .into_iter()
            .find(|s| s.label("pool") == Some(pool))
            .map(|s| s.value)
    }

    #[test]
    fn test_add_overwrites_same_identity() {
        let cache = MetricCache::new();
        cache.add(sample("tank", 1.0));
        cache.add(sample("tank", 2.0));
        cache.add(sample("backup", 3.0));

        assert_eq!(cache.len(), 2);
        assert_eq!(value_of(&cache, "tank"), Some(2.0));
    }

    #[test]
    fn test_replace_drops_missing_entries() {
        let shared = MetricCache::new();
        shared.add(sample("tank", 1.0));
        shared.add(sample("old", 1.0));

        let cycle = MetricCache::new();
        cycle.add(sample("tank", 5.0));
        shared.replace(&cycle);

        assert_eq!(shared.len(), 1);
        assert_eq!(value_of(&shared, "tank"), Some(5.0));
        assert_eq!(value_of(&shared, "old"), None);
    }

    #[test]
    fn test_merge_only_adds_absent_identities() {
        let shared = MetricCache::new();
        shared.add(sample("tank", 1.0));

        let cycle = MetricCache::new();
        cycle.add(sample("tank", 9.0));
        cycle.add(sample("backup", 2.0));
        shared.merge(&cycle);

        assert_eq!(shared.len(), 2);
        assert_eq!(value_of(&shared, "tank"), Some(1.0));
        assert_eq!(value_of(&shared, "backup"), Some(2.0));
    }

    #[test]
    fn test_overlay_overwrites_and_keeps() {
        let shared = MetricCache::new();
        shared.add(sample("tank", 1.0));
        shared.add(sample("old", 1.0));

        let cycle = MetricCache::new();
        cycle.add(sample("tank", 4.0));
        cycle.add(sample("backup", 2.0));
        shared.overlay(&cycle);

        assert_eq!(shared.len(), 3);
        assert_eq!(value_of(&shared, "tank"), Some(4.0));
        assert_eq!(value_of(&shared, "old"), Some(1.0));
        assert_eq!(value_of(&shared, "backup"), Some(2.0));
    }

    #[test]
    fn test_snapshot_excluding_index() {
        let shared = MetricCache::new();
        shared.add(sample("tank", 1.0));
        shared.add(sample("backup", 2.0));

        let cycle = MetricCache::new();
        cycle.add(sample("tank", 3.0));

        let replay = shared.snapshot_excluding(&cycle.index());
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].label("pool"), Some("backup"));
    }

    #[test]
    fn test_concurrent_adds() {
        let cache = Arc::new(MetricCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        cache.add(sample(&format!("pool{i}-{j}"), j as f64));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
