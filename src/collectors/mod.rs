//! Sub-collectors, one per ZFS resource kind.
//!
//! The set of kinds is fixed: three dataset kinds and the pool kind. A
//! [`SubCollector`] is built fresh from its [`CollectorState`] for every
//! describe and every collection cycle, so property list changes apply on the
//! next cycle.

pub mod dataset;
pub mod pool;

use regex::RegexSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::property::{
    DEFAULT_FILESYSTEM_PROPS, DEFAULT_POOL_PROPS, DEFAULT_SNAPSHOT_PROPS, DEFAULT_VOLUME_PROPS,
};
use crate::sample::{MetricDesc, Sample};
use crate::zfs::{Client, DatasetKind, ZfsError};

pub use dataset::DatasetCollector;
pub use pool::PoolCollector;

/// Error that fails a sub-collector for the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Client(#[from] ZfsError),

    #[error("pool query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to list pools: {0}")]
    PoolResolution(String),
}

/// Lifecycle of one collection cycle, broadcast to every task of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Collecting,
    Completed,
    TimedOut,
}

/// Read side of the cycle state, handed to sub-collectors.
#[derive(Debug, Clone)]
pub struct CycleContext {
    state: watch::Receiver<CycleState>,
}

impl CycleContext {
    pub fn new(state: watch::Receiver<CycleState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.state() == CycleState::TimedOut
    }
}

/// Compiled exclusion patterns matched against dataset names.
#[derive(Debug, Clone)]
pub struct Excludes(RegexSet);

impl Excludes {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RegexSet::new(patterns).map(Excludes)
    }

    pub fn empty() -> Self {
        Excludes(RegexSet::empty())
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

impl Default for Excludes {
    fn default() -> Self {
        Self::empty()
    }
}

/// Capabilities shared by every sub-collector.
pub trait Collector {
    /// Descriptors of the requested properties that are known to the registry.
    fn describe(&self) -> Vec<Arc<MetricDesc>>;

    /// Emits one sample per resolvable (resource, property) of every pool.
    fn update(
        &self,
        out: mpsc::Sender<Sample>,
        pools: Arc<[String]>,
        excludes: Excludes,
        ctx: CycleContext,
    ) -> impl Future<Output = Result<(), CollectError>> + Send;
}

/// The closed set of resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectorKind {
    Dataset(DatasetKind),
    Pool,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 4] = [
        CollectorKind::Dataset(DatasetKind::Filesystem),
        CollectorKind::Dataset(DatasetKind::Snapshot),
        CollectorKind::Dataset(DatasetKind::Volume),
        CollectorKind::Pool,
    ];

    /// Registered collector name, as used in configuration and the
    /// `collector` label of the scrape meta-metrics.
    pub fn name(&self) -> &'static str {
        match self {
            CollectorKind::Dataset(DatasetKind::Filesystem) => "dataset-filesystem",
            CollectorKind::Dataset(DatasetKind::Snapshot) => "dataset-snapshot",
            CollectorKind::Dataset(DatasetKind::Volume) => "dataset-volume",
            CollectorKind::Pool => "pool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn default_enabled(&self) -> bool {
        !matches!(self, CollectorKind::Dataset(DatasetKind::Snapshot))
    }

    pub fn default_properties(&self) -> &'static str {
        match self {
            CollectorKind::Dataset(DatasetKind::Filesystem) => DEFAULT_FILESYSTEM_PROPS,
            CollectorKind::Dataset(DatasetKind::Snapshot) => DEFAULT_SNAPSHOT_PROPS,
            CollectorKind::Dataset(DatasetKind::Volume) => DEFAULT_VOLUME_PROPS,
            CollectorKind::Pool => DEFAULT_POOL_PROPS,
        }
    }

    /// Builds a sub-collector requesting `props`.
    pub fn build(&self, client: Arc<dyn Client>, props: Vec<String>) -> SubCollector {
        match *self {
            CollectorKind::Dataset(kind) => {
                SubCollector::Dataset(DatasetCollector::new(kind, client, props))
            }
            CollectorKind::Pool => SubCollector::Pool(PoolCollector::new(client, props)),
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of one registered collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorState {
    pub kind: CollectorKind,
    pub enabled: bool,
    /// Comma-separated property keys.
    pub properties: String,
}

impl CollectorState {
    pub fn new(kind: CollectorKind) -> Self {
        Self {
            kind,
            enabled: kind.default_enabled(),
            properties: kind.default_properties().to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn property_list(&self) -> Vec<String> {
        split_properties(&self.properties)
    }

    pub fn build(&self, client: Arc<dyn Client>) -> SubCollector {
        self.kind.build(client, self.property_list())
    }
}

/// Default states of every collector kind.
pub fn default_states() -> Vec<CollectorState> {
    CollectorKind::ALL.into_iter().map(CollectorState::new).collect()
}

pub fn split_properties(props: &str) -> Vec<String> {
    props
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// A sub-collector of one of the fixed kinds.
#[derive(Clone)]
pub enum SubCollector {
    Dataset(DatasetCollector),
    Pool(PoolCollector),
}

impl Collector for SubCollector {
    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        match self {
            SubCollector::Dataset(c) => c.describe(),
            SubCollector::Pool(c) => c.describe(),
        }
    }

    async fn update(
        &self,
        out: mpsc::Sender<Sample>,
        pools: Arc<[String]>,
        excludes: Excludes,
        ctx: CycleContext,
    ) -> Result<(), CollectError> {
        match self {
            SubCollector::Dataset(c) => c.update(out, pools, excludes, ctx).await,
            SubCollector::Pool(c) => c.update(out, pools, excludes, ctx).await,
        }
    }
}

/// Awaits every pool task and reports the first error observed.
pub(crate) async fn join_pools(
    mut tasks: tokio::task::JoinSet<Result<(), CollectError>>,
) -> Result<(), CollectError> {
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(CollectError::from).and_then(|r| r);
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
