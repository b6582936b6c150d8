//! In-memory ZFS client shared by the integration tests.

#![allow(dead_code)]

use ahash::AHashMap as HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zfs_exporter::collectors::CollectorKind;
use zfs_exporter::zfs::{
    Client, DatasetKind, DatasetProperties, Datasets, Pool, PoolProperties, ZfsError,
};
use zfs_exporter::{Sample, ZfsCollector, ZfsConfig};

#[derive(Default)]
struct Inner {
    pools: Vec<String>,
    datasets: HashMap<(String, DatasetKind), Vec<DatasetProperties>>,
    pool_props: HashMap<String, PoolProperties>,
    delays: HashMap<CollectorKind, Duration>,
    failing: Vec<(String, CollectorKind)>,
    pool_names_error: bool,
}

/// Scriptable client. Every query increments [`MockClient::calls`].
#[derive(Default, Clone)]
pub struct MockClient {
    inner: Arc<Mutex<Inner>>,
    calls: Arc<AtomicUsize>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(self, pool: &str) -> Self {
        self.inner.lock().unwrap().pools.push(pool.to_string());
        self
    }

    pub fn with_dataset(self, pool: &str, kind: DatasetKind, dataset: DatasetProperties) -> Self {
        self.inner
            .lock()
            .unwrap()
            .datasets
            .entry((pool.to_string(), kind))
            .or_default()
            .push(dataset);
        self
    }

    pub fn with_pool_properties(self, props: PoolProperties) -> Self {
        self.inner
            .lock()
            .unwrap()
            .pool_props
            .insert(props.name.clone(), props);
        self
    }

    /// Makes every query of `kind` sleep for `delay`.
    pub fn set_delay(&self, kind: CollectorKind, delay: Duration) {
        self.inner.lock().unwrap().delays.insert(kind, delay);
    }

    /// Makes queries of `kind` against `pool` fail.
    pub fn fail(&self, pool: &str, kind: CollectorKind) {
        self.inner
            .lock()
            .unwrap()
            .failing
            .push((pool.to_string(), kind));
    }

    pub fn fail_pool_names(&self, fail: bool) {
        self.inner.lock().unwrap().pool_names_error = fail;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn query(&self, pool: &str, kind: CollectorKind) -> Result<(), ZfsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, failing) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.delays.get(&kind).copied(),
                inner
                    .failing
                    .iter()
                    .any(|(p, k)| p == pool && *k == kind),
            )
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if failing {
            return Err(ZfsError::PoolNotFound(pool.to_string()));
        }
        Ok(())
    }
}

struct MockDatasets {
    client: MockClient,
    pool: String,
    kind: DatasetKind,
}

impl Datasets for MockDatasets {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn kind(&self) -> DatasetKind {
        self.kind
    }

    fn properties(&self, props: &[String]) -> Result<Vec<DatasetProperties>, ZfsError> {
        self.client
            .query(&self.pool, CollectorKind::Dataset(self.kind))?;
        let inner = self.client.inner.lock().unwrap();
        let datasets = inner
            .datasets
            .get(&(self.pool.clone(), self.kind))
            .cloned()
            .unwrap_or_default();
        Ok(datasets
            .into_iter()
            .map(|d| {
                let mut filtered = DatasetProperties::new(d.name.clone());
                for key in props {
                    if let Some(value) = d.properties.get(key) {
                        filtered = filtered.with(key.clone(), value.clone());
                    }
                }
                filtered
            })
            .collect())
    }
}

struct MockPool {
    client: MockClient,
    name: String,
}

impl Pool for MockPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self, props: &[String]) -> Result<PoolProperties, ZfsError> {
        self.client.query(&self.name, CollectorKind::Pool)?;
        let inner = self.client.inner.lock().unwrap();
        let all = inner
            .pool_props
            .get(&self.name)
            .ok_or_else(|| ZfsError::PoolNotFound(self.name.clone()))?;
        let mut filtered = PoolProperties::new(self.name.clone());
        for key in props {
            if let Some(value) = all.properties.get(key) {
                filtered = filtered.with(key.clone(), value.clone());
            }
        }
        Ok(filtered)
    }
}

impl Client for MockClient {
    fn pool_names(&self) -> Result<Vec<String>, ZfsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        if inner.pool_names_error {
            return Err(ZfsError::PoolNotFound("*".to_string()));
        }
        Ok(inner.pools.clone())
    }

    fn pool<'a>(&'a self, name: &str) -> Box<dyn Pool + 'a> {
        Box::new(MockPool {
            client: self.clone(),
            name: name.to_string(),
        })
    }

    fn datasets<'a>(&'a self, pool: &str, kind: DatasetKind) -> Box<dyn Datasets + 'a> {
        Box::new(MockDatasets {
            client: self.clone(),
            pool: pool.to_string(),
            kind,
        })
    }
}

/// Collector over `client` with every collector disabled.
pub fn collector(client: &MockClient, configure: impl FnOnce(&mut ZfsConfig)) -> ZfsCollector {
    let mut config = ZfsConfig::new(Arc::new(client.clone()));
    configure(&mut config);
    let collector = ZfsCollector::new(config).unwrap();
    for kind in CollectorKind::ALL {
        collector.set_enabled(kind.name(), false).unwrap();
    }
    collector
}

pub fn find<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
    samples.iter().filter(|s| s.name() == name).collect()
}

/// Value of the meta-sample `name` for `collector`.
pub fn meta(samples: &[Sample], name: &str, collector: &str) -> Option<f64> {
    samples
        .iter()
        .find(|s| s.name() == name && s.label("collector") == Some(collector))
        .map(|s| s.value)
}

pub fn success(samples: &[Sample], collector: &str) -> Option<f64> {
    meta(samples, "zfs_scrape_collector_success", collector)
}
