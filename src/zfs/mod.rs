//! ZFS resource client contract.
//!
//! The exporter never talks to ZFS directly; everything it needs goes through
//! the [`Client`] trait. A command-line backed implementation lives in
//! [`command`], tests provide in-memory implementations.

pub mod command;

use ahash::AHashMap as HashMap;
use std::fmt;

pub use command::CommandClient;

/// Dataset categories within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKind {
    Filesystem,
    Snapshot,
    Volume,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Filesystem,
        DatasetKind::Snapshot,
        DatasetKind::Volume,
    ];

    /// Name as understood by `zfs get -t` and exported in the `type` label.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Filesystem => "filesystem",
            DatasetKind::Snapshot => "snapshot",
            DatasetKind::Volume => "volume",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool health states reported by `zpool get health`.
pub mod pool_status {
    pub const ONLINE: &str = "ONLINE";
    pub const DEGRADED: &str = "DEGRADED";
    pub const FAULTED: &str = "FAULTED";
    pub const OFFLINE: &str = "OFFLINE";
    pub const UNAVAIL: &str = "UNAVAIL";
    pub const REMOVED: &str = "REMOVED";
    pub const SUSPENDED: &str = "SUSPENDED";
}

/// Compression algorithm names reported by `zfs get compression`.
pub mod compression {
    pub const OFF: &str = "off";
    pub const ON: &str = "on";
    pub const LZ4: &str = "lz4";
    pub const ZSTD: &str = "zstd";
    pub const ZSTD_FAST: &str = "zstd-fast";
}

/// Errors raised by a resource client.
#[derive(Debug, thiserror::Error)]
pub enum ZfsError {
    #[error("failed to execute `{command}`: {source}")]
    Exec {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("unexpected output from `{command}`: {line:?}")]
    Parse { command: String, line: String },

    #[error("pool not found: {0}")]
    PoolNotFound(String),
}

/// Raw properties of a single dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetProperties {
    pub name: String,
    pub properties: HashMap<String, String>,
}

impl DatasetProperties {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn dataset_name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}

/// Raw properties of a pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolProperties {
    pub name: String,
    pub properties: HashMap<String, String>,
}

impl PoolProperties {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}

/// Handle on a single pool.
pub trait Pool {
    fn name(&self) -> &str;
    fn properties(&self, props: &[String]) -> Result<PoolProperties, ZfsError>;
}

/// Handle on all datasets of one kind within a pool.
pub trait Datasets {
    fn pool(&self) -> &str;
    fn kind(&self) -> DatasetKind;
    fn properties(&self, props: &[String]) -> Result<Vec<DatasetProperties>, ZfsError>;
}

/// Access to the managed resource hierarchy.
///
/// Calls are blocking; the collectors run them on the blocking thread pool.
pub trait Client: Send + Sync {
    /// Names of every imported pool.
    fn pool_names(&self) -> Result<Vec<String>, ZfsError>;

    fn pool<'a>(&'a self, name: &str) -> Box<dyn Pool + 'a>;

    fn datasets<'a>(&'a self, pool: &str, kind: DatasetKind) -> Box<dyn Datasets + 'a>;
}
