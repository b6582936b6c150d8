//! Collection orchestrator.
//!
//! A [`ZfsCollector`] runs one collection cycle per request: it resolves the
//! pools to inspect, fans out to every enabled sub-collector, fans their
//! samples back in through a per-cycle cache and streams them to the caller.
//! A cycle that overruns its deadline is completed from the shared cache, so
//! a scrape never blocks past the deadline and never loses a metric that an
//! earlier cycle produced.
//!
//! When the pools cannot be listed the cycle reports every collector as
//! failed and serves the remaining values from the shared cache.
//!
//! Only one cycle runs at a time. A request arriving while a cycle is in
//! flight is answered straight from the shared cache.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task;
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

use crate::cache::MetricCache;
use crate::collectors::{
    default_states, CollectError, Collector, CollectorKind, CollectorState, CycleContext,
    CycleState, Excludes,
};
use crate::sample::{MetricDesc, Sample};
use crate::zfs::{Client, ZfsError};

/// Default collection deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(8);

// Samples buffered between sub-collectors and the fan-in task.
const PROXY_BUFFER: usize = 256;

pub static SCRAPE_DURATION_DESC: Lazy<Arc<MetricDesc>> = Lazy::new(|| {
    Arc::new(MetricDesc::new(
        "scrape",
        "collector_duration_seconds",
        "zfs_exporter: Duration of a collector scrape.",
        &["collector"],
    ))
});

pub static SCRAPE_SUCCESS_DESC: Lazy<Arc<MetricDesc>> = Lazy::new(|| {
    Arc::new(MetricDesc::new(
        "scrape",
        "collector_success",
        "zfs_exporter: Whether a collector succeeded.",
        &["collector"],
    ))
});

/// Errors raised while building or reconfiguring a [`ZfsCollector`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown collector: {0}")]
    UnknownCollector(String),

    #[error("deadline must be greater than zero")]
    ZeroDeadline,
}

/// Settings of a [`ZfsCollector`].
pub struct ZfsConfig {
    pub disable_metrics: bool,
    pub deadline: Duration,
    /// Pool allowlist. Empty means every discovered pool.
    pub pools: Vec<String>,
    /// Regular expressions matched against dataset names.
    pub excludes: Vec<String>,
    pub client: Arc<dyn Client>,
}

impl ZfsConfig {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            disable_metrics: false,
            deadline: DEFAULT_DEADLINE,
            pools: Vec::new(),
            excludes: Vec::new(),
            client,
        }
    }
}

/// Aggregate collector over every registered sub-collector.
pub struct ZfsCollector {
    client: Arc<dyn Client>,
    pools: Vec<String>,
    excludes: Excludes,
    deadline: Duration,
    disable_metrics: bool,
    states: RwLock<BTreeMap<CollectorKind, CollectorState>>,
    cache: Arc<MetricCache>,
    ready: Arc<Semaphore>,
}

impl ZfsCollector {
    pub fn new(config: ZfsConfig) -> Result<Self, BuildError> {
        if config.deadline.is_zero() {
            return Err(BuildError::ZeroDeadline);
        }

        let mut pools = config.pools;
        pools.sort();
        let mut patterns = config.excludes;
        patterns.sort();
        for pattern in &patterns {
            regex::Regex::new(pattern).map_err(|source| BuildError::InvalidExclude {
                pattern: pattern.clone(),
                source,
            })?;
        }
        let excludes = Excludes::new(&patterns).map_err(|source| BuildError::InvalidExclude {
            pattern: patterns.join(","),
            source,
        })?;

        Ok(Self {
            client: config.client,
            pools,
            excludes,
            deadline: config.deadline,
            disable_metrics: config.disable_metrics,
            states: RwLock::new(default_states().into_iter().map(|s| (s.kind, s)).collect()),
            cache: Arc::new(MetricCache::new()),
            ready: Arc::new(Semaphore::new(1)),
        })
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Configured pool allowlist, sorted.
    pub fn pools(&self) -> &[String] {
        &self.pools
    }

    /// Current state of every registered collector, in name order.
    pub fn states(&self) -> Vec<CollectorState> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = states.values().cloned().collect();
        states.sort_by_key(|s| s.name());
        states
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), BuildError> {
        self.update_state(name, |state| state.enabled = enabled)
    }

    /// Overrides the comma-separated property list of a collector. Applies
    /// from the next cycle on.
    pub fn set_properties(&self, name: &str, properties: &str) -> Result<(), BuildError> {
        self.update_state(name, |state| state.properties = properties.to_string())
    }

    fn update_state(
        &self,
        name: &str,
        apply: impl FnOnce(&mut CollectorState),
    ) -> Result<(), BuildError> {
        let kind = CollectorKind::from_name(name)
            .ok_or_else(|| BuildError::UnknownCollector(name.to_string()))?;
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(&kind) {
            apply(state);
        }
        Ok(())
    }

    fn enabled_states(&self) -> Vec<CollectorState> {
        self.states()
            .into_iter()
            .filter(|s| s.enabled)
            .collect()
    }

    /// Descriptors of every family this collector can export.
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        let mut descs = Vec::new();
        if !self.disable_metrics {
            descs.push(SCRAPE_DURATION_DESC.clone());
            descs.push(SCRAPE_SUCCESS_DESC.clone());
        }
        for state in self.enabled_states() {
            descs.extend(state.build(self.client.clone()).describe());
        }
        descs
    }

    /// Lists the pools a cycle would inspect.
    ///
    /// Blocking. With an allowlist, configured pools that were not discovered
    /// are logged and left out.
    pub fn resolve_pools(&self) -> Result<Vec<String>, ZfsError> {
        resolve_pools(self.client.as_ref(), &self.pools)
    }

    /// Runs one collection cycle and collects its output.
    pub async fn scrape(&self) -> Vec<Sample> {
        let (tx, mut rx) = mpsc::channel(PROXY_BUFFER);
        let drain = async move {
            let mut samples = Vec::new();
            while let Some(sample) = rx.recv().await {
                samples.push(sample);
            }
            samples
        };
        let ((), samples) = tokio::join!(self.collect(tx), drain);
        samples
    }

    /// Runs one collection cycle, streaming samples into `out`.
    ///
    /// Returns once the cycle completed or its deadline fired. In both cases
    /// nothing is written to `out` after this returns.
    pub async fn collect(&self, out: mpsc::Sender<Sample>) {
        let Ok(permit) = self.ready.clone().try_acquire_owned() else {
            debug!("Collection already in progress, serving cached metrics");
            for sample in self.cache.snapshot_excluding(&Default::default()) {
                if out.send(sample).await.is_err() {
                    break;
                }
            }
            return;
        };

        let started = Instant::now();
        let deadline = started + self.deadline;
        let (state_tx, state_rx) = watch::channel(CycleState::Collecting);
        let state_tx = Arc::new(state_tx);
        let ctx = CycleContext::new(state_rx.clone());
        let (proxy_tx, proxy_rx) = mpsc::channel(PROXY_BUFFER);
        let (finalized_tx, mut finalized_rx) = oneshot::channel();

        let client = self.client.clone();
        let wanted = self.pools.clone();
        let pools = match time::timeout_at(
            deadline,
            task::spawn_blocking(move || resolve_pools(client.as_ref(), &wanted)),
        )
        .await
        {
            Ok(Ok(Ok(pools))) => Ok(Arc::<[String]>::from(pools)),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("deadline exceeded while listing pools".to_string()),
        };
        if let Err(e) = &pools {
            error!(error = %e, "Failed to resolve pools, serving cached metrics");
        }

        let enabled = self.enabled_states();
        tokio::spawn(fan_in(FanIn {
            proxy: proxy_rx,
            out,
            state: state_rx,
            state_tx: state_tx.clone(),
            cycle: Arc::new(MetricCache::new()),
            shared: self.cache.clone(),
            permit,
            finalized: finalized_tx,
            started,
            collectors: enabled.iter().map(|s| s.name()).collect(),
            disable_metrics: self.disable_metrics,
            fallback: pools.is_err(),
        }));

        for state in enabled {
            let collector = state.build(self.client.clone());
            let pools = pools.clone();
            let excludes = self.excludes.clone();
            let ctx = ctx.clone();
            let proxy = proxy_tx.clone();
            let disable_metrics = self.disable_metrics;

            tokio::spawn(async move {
                let begin = Instant::now();
                let (result, duration) = match pools {
                    Ok(pools) => {
                        let result = collector.update(proxy.clone(), pools, excludes, ctx.clone()).await;
                        (result, begin.elapsed())
                    }
                    Err(e) => (Err(CollectError::PoolResolution(e)), Duration::ZERO),
                };
                publish_collector_metrics(
                    &proxy,
                    state.name(),
                    result,
                    duration,
                    &ctx,
                    disable_metrics,
                )
                .await;
            });
        }
        // Each sub-collector task owns a proxy sender; the proxy closes once
        // the last one finishes.
        drop(proxy_tx);

        if time::timeout_at(deadline, &mut finalized_rx).await.is_ok() {
            return;
        }

        let fired = state_tx.send_if_modified(|state| {
            if *state == CycleState::Collecting {
                *state = CycleState::TimedOut;
                true
            } else {
                false
            }
        });
        if fired {
            warn!(deadline = ?self.deadline, "Collection deadline exceeded, serving cached metrics");
        }
        let _ = finalized_rx.await;
    }
}

fn resolve_pools(client: &dyn Client, wanted: &[String]) -> Result<Vec<String>, ZfsError> {
    let discovered = client.pool_names()?;
    if wanted.is_empty() {
        return Ok(discovered);
    }

    let mut pools = Vec::with_capacity(wanted.len());
    for pool in wanted {
        if discovered.contains(pool) {
            pools.push(pool.clone());
        } else {
            warn!(pool = %pool, "Pool unavailable");
        }
    }
    Ok(pools)
}

async fn publish_collector_metrics(
    proxy: &mpsc::Sender<Sample>,
    name: &str,
    result: Result<(), CollectError>,
    duration: Duration,
    ctx: &CycleContext,
    disable_metrics: bool,
) {
    let seconds = duration.as_secs_f64();
    let success = match result {
        Err(e) => {
            error!(collector = name, status = "error", duration_seconds = seconds, error = %e, "Executing collector");
            0.0
        }
        Ok(()) if ctx.deadline_exceeded() => {
            warn!(collector = name, status = "delayed", duration_seconds = seconds, "Executing collector");
            0.0
        }
        Ok(()) => {
            debug!(collector = name, status = "ok", duration_seconds = seconds, "Executing collector");
            1.0
        }
    };

    if disable_metrics {
        return;
    }
    let labels = vec![name.to_string()];
    let _ = proxy
        .send(Sample::new(SCRAPE_DURATION_DESC.clone(), labels.clone(), seconds))
        .await;
    let _ = proxy
        .send(Sample::new(SCRAPE_SUCCESS_DESC.clone(), labels, success))
        .await;
}

struct FanIn {
    proxy: mpsc::Receiver<Sample>,
    out: mpsc::Sender<Sample>,
    state: watch::Receiver<CycleState>,
    state_tx: Arc<watch::Sender<CycleState>>,
    cycle: Arc<MetricCache>,
    shared: Arc<MetricCache>,
    permit: OwnedSemaphorePermit,
    finalized: oneshot::Sender<()>,
    started: Instant,
    /// Collectors running in this cycle.
    collectors: Vec<&'static str>,
    disable_metrics: bool,
    /// Pools could not be resolved. The cycle only carries failure
    /// meta-samples and must not displace cached values.
    fallback: bool,
}

enum Event {
    TimedOut,
    Sample(Option<Sample>),
}

enum Forward {
    Sent,
    Closed(Sample),
    TimedOut(Sample),
}

/// Records every sample of the cycle and forwards it while the caller is
/// still listening.
///
/// A sample enters the per-cycle cache only once it has been handed to the
/// caller, or after the caller was released. On timeout the shared cache
/// replays exactly the identities the caller has not seen yet.
async fn fan_in(task: FanIn) {
    let FanIn {
        mut proxy,
        out,
        mut state,
        state_tx,
        cycle,
        shared,
        permit,
        finalized,
        started,
        collectors,
        disable_metrics,
        fallback,
    } = task;
    let mut out = Some(out);
    let mut finalized = Some(finalized);

    loop {
        let event = if out.is_some() {
            tokio::select! {
                biased;
                _ = timed_out(&mut state) => Event::TimedOut,
                sample = proxy.recv() => Event::Sample(sample),
            }
        } else {
            Event::Sample(proxy.recv().await)
        };

        let sample = match event {
            Event::Sample(Some(sample)) => sample,
            Event::Sample(None) => break,
            Event::TimedOut => {
                if let Some(out) = out.take() {
                    let pending = pending_meta(&cycle, &collectors, started, disable_metrics);
                    replay_missing(&shared, &cycle, pending, &out).await;
                }
                finalize(&mut finalized);
                continue;
            }
        };

        let forward = match out.as_ref() {
            Some(tx) => {
                let reserved = tokio::select! {
                    biased;
                    _ = timed_out(&mut state) => None,
                    permit = tx.reserve() => Some(permit),
                };
                match reserved {
                    Some(Ok(slot)) => {
                        cycle.add(sample.clone());
                        slot.send(sample);
                        Forward::Sent
                    }
                    Some(Err(_)) => Forward::Closed(sample),
                    None => Forward::TimedOut(sample),
                }
            }
            None => Forward::Closed(sample),
        };

        match forward {
            Forward::Sent => {}
            Forward::Closed(sample) => {
                if out.take().is_some() {
                    debug!("Collection output closed, recording remaining samples only");
                }
                cycle.add(sample);
                finalize(&mut finalized);
            }
            Forward::TimedOut(sample) => {
                if let Some(out) = out.take() {
                    let pending = pending_meta(&cycle, &collectors, started, disable_metrics);
                    replay_missing(&shared, &cycle, pending, &out).await;
                }
                cycle.add(sample);
                finalize(&mut finalized);
            }
        }
    }

    if fallback {
        if let Some(out) = out.take() {
            replay_missing(&shared, &cycle, Vec::new(), &out).await;
        }
        shared.overlay(&cycle);
    } else {
        shared.replace(&cycle);
    }
    drop(out);
    drop(permit);
    state_tx.send_if_modified(|state| {
        if *state == CycleState::Collecting {
            *state = CycleState::Completed;
            true
        } else {
            false
        }
    });
    finalize(&mut finalized);
}

/// Failure meta-samples for every collector whose own meta-samples have not
/// been forwarded yet.
fn pending_meta(
    cycle: &MetricCache,
    collectors: &[&'static str],
    started: Instant,
    disable_metrics: bool,
) -> Vec<Sample> {
    if disable_metrics {
        return Vec::new();
    }
    let seen = cycle.index();
    let seconds = started.elapsed().as_secs_f64();
    collectors
        .iter()
        .flat_map(|name| {
            let labels = vec![name.to_string()];
            [
                Sample::new(SCRAPE_DURATION_DESC.clone(), labels.clone(), seconds),
                Sample::new(SCRAPE_SUCCESS_DESC.clone(), labels, 0.0),
            ]
        })
        .filter(|sample| !seen.contains(&sample.identity()))
        .collect()
}

fn is_scrape_meta(sample: &Sample) -> bool {
    let name = sample.name();
    name == SCRAPE_DURATION_DESC.fq_name || name == SCRAPE_SUCCESS_DESC.fq_name
}

/// Backfills the shared cache from the cycle and sends every shared entry the
/// cycle has not produced, followed by `pending`.
///
/// Cached meta-samples describe an earlier cycle and are never replayed;
/// `pending` stands in for collectors that have not reported yet.
async fn replay_missing(
    shared: &MetricCache,
    cycle: &MetricCache,
    pending: Vec<Sample>,
    out: &mpsc::Sender<Sample>,
) {
    for sample in &pending {
        cycle.add(sample.clone());
    }
    shared.merge(cycle);
    let index = cycle.index();
    let stale: Vec<_> = shared
        .snapshot_excluding(&index)
        .into_iter()
        .filter(|sample| !is_scrape_meta(sample))
        .collect();
    debug!(
        fresh = index.len(),
        stale = stale.len(),
        pending = pending.len(),
        "Replaying cached metrics"
    );
    for sample in stale.into_iter().chain(pending) {
        if out.send(sample).await.is_err() {
            break;
        }
    }
}

async fn timed_out(state: &mut watch::Receiver<CycleState>) {
    let closed = state
        .wait_for(|s| *s == CycleState::TimedOut)
        .await
        .is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn finalize(finalized: &mut Option<oneshot::Sender<()>>) {
    if let Some(tx) = finalized.take() {
        let _ = tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::{DatasetKind, DatasetProperties, Datasets, Pool, PoolProperties};

    struct StaticClient {
        pools: Vec<String>,
    }

    struct StaticPool(String);

    impl Pool for StaticPool {
        fn name(&self) -> &str {
            &self.0
        }

        fn properties(&self, _props: &[String]) -> Result<PoolProperties, ZfsError> {
            Ok(PoolProperties::new(self.0.clone()).with("size", "100"))
        }
    }

    struct Empty;

    impl Datasets for Empty {
        fn pool(&self) -> &str {
            ""
        }

        fn kind(&self) -> DatasetKind {
            DatasetKind::Filesystem
        }

        fn properties(&self, _props: &[String]) -> Result<Vec<DatasetProperties>, ZfsError> {
            Ok(Vec::new())
        }
    }

    impl Client for StaticClient {
        fn pool_names(&self) -> Result<Vec<String>, ZfsError> {
            Ok(self.pools.clone())
        }

        fn pool<'a>(&'a self, name: &str) -> Box<dyn Pool + 'a> {
            Box::new(StaticPool(name.to_string()))
        }

        fn datasets<'a>(&'a self, _pool: &str, _kind: DatasetKind) -> Box<dyn Datasets + 'a> {
            Box::new(Empty)
        }
    }

    fn client() -> Arc<dyn Client> {
        Arc::new(StaticClient {
            pools: vec!["tank".into(), "backup".into()],
        })
    }

    #[test]
    fn test_new_rejects_bad_excludes() {
        let mut config = ZfsConfig::new(client());
        config.excludes = vec!["ok".into(), "(".into()];
        match ZfsCollector::new(config) {
            Err(BuildError::InvalidExclude { pattern, .. }) => assert_eq!(pattern, "("),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn test_new_rejects_zero_deadline() {
        let mut config = ZfsConfig::new(client());
        config.deadline = Duration::ZERO;
        assert!(matches!(ZfsCollector::new(config), Err(BuildError::ZeroDeadline)));
    }

    #[test]
    fn test_collector_state_updates() {
        let collector = ZfsCollector::new(ZfsConfig::new(client())).unwrap();
        collector.set_enabled("dataset-snapshot", true).unwrap();
        collector.set_properties("pool", "size,health").unwrap();
        assert!(matches!(
            collector.set_enabled("dataset-bookmark", true),
            Err(BuildError::UnknownCollector(_))
        ));

        let states = collector.states();
        assert!(states.iter().all(|s| s.enabled));
        let pool = states.iter().find(|s| s.name() == "pool").unwrap();
        assert_eq!(pool.property_list(), vec!["size", "health"]);
    }

    #[test]
    fn test_describe_includes_meta_descriptors() {
        let descs = ZfsCollector::new(ZfsConfig::new(client())).unwrap().describe();
        assert!(descs
            .iter()
            .any(|d| d.fq_name == "zfs_scrape_collector_duration_seconds"));
        assert!(descs.iter().any(|d| d.fq_name == "zfs_pool_health"));
        let volsize = descs
            .iter()
            .find(|d| d.fq_name == "zfs_dataset_volume_size_bytes")
            .unwrap();
        assert_eq!(volsize.labels, vec!["name", "pool", "type"]);

        let mut config = ZfsConfig::new(client());
        config.disable_metrics = true;
        let descs = ZfsCollector::new(config).unwrap().describe();
        assert!(!descs.iter().any(|d| d.fq_name.starts_with("zfs_scrape_")));
    }

    #[test]
    fn test_resolve_pools_allowlist() {
        let mut config = ZfsConfig::new(client());
        config.pools = vec!["tank".into(), "missing".into()];
        let collector = ZfsCollector::new(config).unwrap();
        assert_eq!(collector.pools(), ["missing", "tank"]);
        assert_eq!(collector.resolve_pools().unwrap(), vec!["tank"]);
    }

    #[tokio::test]
    async fn test_scrape_emits_meta_samples() {
        let collector = ZfsCollector::new(ZfsConfig::new(client())).unwrap();
        collector.set_properties("pool", "size").unwrap();
        let samples = collector.scrape().await;

        let sizes: Vec<_> = samples
            .iter()
            .filter(|s| s.name() == "zfs_pool_size_bytes")
            .collect();
        assert_eq!(sizes.len(), 2);

        let successes: Vec<_> = samples
            .iter()
            .filter(|s| s.name() == "zfs_scrape_collector_success")
            .collect();
        // snapshot collector is disabled by default
        assert_eq!(successes.len(), 3);
        assert!(successes.iter().all(|s| s.value == 1.0));
    }
}
