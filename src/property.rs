//! Registry of known ZFS properties.
//!
//! Maps raw property keys (as accepted by `zfs get`/`zpool get`) to exported
//! metric descriptors and value transforms. The tables are built once on first
//! use and never mutated afterwards.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

use crate::sample::{MetricDesc, Sample};
use crate::transform::{self, TransformError, TransformFn};

pub const DEFAULT_FILESYSTEM_PROPS: &str =
    "available,logicalused,quota,referenced,used,usedbydataset,written";
pub const DEFAULT_SNAPSHOT_PROPS: &str = "logicalused,referenced,used,written";
pub const DEFAULT_VOLUME_PROPS: &str =
    "available,logicalused,referenced,used,usedbydataset,volsize,written";
pub const DEFAULT_POOL_PROPS: &str =
    "allocated,dedupratio,capacity,expandsize,fragmentation,free,freeing,health,leaked,readonly,size";

/// Help text of properties missing from the registry.
pub const PROPERTY_UNSUPPORTED_HELP: &str = "!!! This property is unsupported, results are likely to be undesirable, please file an issue to have this property supported !!!";

pub const DATASET_LABELS: &[&str] = &["name", "pool", "type"];
pub const POOL_LABELS: &[&str] = &["pool"];

/// Metric subsystem a property is exported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Dataset,
    Pool,
}

impl Subsystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Dataset => "dataset",
            Subsystem::Pool => "pool",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    #[error("unsupported {subsystem} property: {key}")]
    Unsupported { subsystem: Subsystem, key: String },
}

/// A known property: its exported descriptor and how to convert its value.
#[derive(Debug, Clone)]
pub struct Property {
    pub desc: Arc<MetricDesc>,
    pub transform: TransformFn,
}

impl Property {
    fn new(
        subsystem: Subsystem,
        name: &str,
        help: impl Into<String>,
        transform: TransformFn,
        labels: &[&str],
    ) -> Self {
        Self {
            desc: Arc::new(MetricDesc::new(subsystem.as_str(), name, help, labels)),
            transform,
        }
    }

    /// Transforms `value` into a sample carrying `label_values`.
    pub fn sample(&self, value: &str, label_values: Vec<String>) -> Result<Sample, TransformError> {
        let v = (self.transform)(value)?;
        Ok(Sample::new(self.desc.clone(), label_values, v))
    }
}

/// Properties of one subsystem, keyed by raw property name.
#[derive(Debug)]
pub struct PropertyStore {
    subsystem: Subsystem,
    default_labels: &'static [&'static str],
    store: HashMap<&'static str, Property>,
}

impl PropertyStore {
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn default_labels(&self) -> &'static [&'static str] {
        self.default_labels
    }

    /// Looks up `key`. Unknown keys yield a passthrough property named after
    /// the key, together with the error describing the miss.
    pub fn find(&self, key: &str) -> (Property, Option<PropertyError>) {
        match self.store.get(key) {
            Some(prop) => (prop.clone(), None),
            None => (
                Property::new(
                    self.subsystem,
                    key,
                    PROPERTY_UNSUPPORTED_HELP,
                    transform::numeric,
                    self.default_labels,
                ),
                Some(PropertyError::Unsupported {
                    subsystem: self.subsystem,
                    key: key.to_string(),
                }),
            ),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.store.keys().copied()
    }
}

fn store(
    subsystem: Subsystem,
    default_labels: &'static [&'static str],
    entries: &[(&'static str, &str, &str, TransformFn)],
) -> PropertyStore {
    PropertyStore {
        subsystem,
        default_labels,
        store: entries
            .iter()
            .map(|&(key, name, help, transform)| {
                (
                    key,
                    Property::new(subsystem, name, help, transform, default_labels),
                )
            })
            .collect(),
    }
}

pub static DATASET_PROPERTIES: Lazy<PropertyStore> = Lazy::new(|| {
    store(
        Subsystem::Dataset,
        DATASET_LABELS,
        &[
            (
                "atime",
                "atime",
                "Whether the access time for files is updated when they are read [0: off, 1: on].",
                transform::boolean,
            ),
            (
                "available",
                "available_bytes",
                "The amount of space in bytes available to the dataset and all its children.",
                transform::numeric,
            ),
            (
                "compression",
                "compression",
                "The compression algorithm used for this dataset. [0: off, 1: on, 2: lz4, 3: zstd, 4: zstd-fast, 3xx: zstd-N, 4xxxx: zstd-fast-N].",
                transform::compression,
            ),
            (
                "compressratio",
                "compressratio",
                "For non-snapshots, the compression ratio achieved for the used space of this dataset, For snapshots, the compressratio is the same as the refcompressratio property.",
                transform::multiplier,
            ),
            (
                "creation",
                "creation",
                "The time this dataset was created.",
                transform::numeric,
            ),
            (
                "exec",
                "exec",
                "Whether processes can be executed from within this file system [0: off, 1: on].",
                transform::boolean,
            ),
            (
                "logbias",
                "logbias",
                "Handling of synchronous requests in this dataset. [1: latency, 2: throughput].",
                transform::logbias,
            ),
            (
                "logicalused",
                "logical_used_bytes",
                "The amount of space in bytes that is \"logically\" consumed by this dataset and all its descendents. See the \"used_bytes\" property.",
                transform::numeric,
            ),
            (
                "logicalreferenced",
                "logical_referenced_bytes",
                "The amount of space that is \"logically\" accessible by this dataset. See the \"referenced_bytes\" property.",
                transform::numeric,
            ),
            (
                "mounted",
                "mounted",
                "Whether the file system is currently mounted. [0: no, 1: yes].",
                transform::boolean,
            ),
            (
                "primarycache",
                "primarycache",
                "What is cached in the primary cache (ARC) [1: all, 2: metadata, 0: none].",
                transform::cache_mode,
            ),
            (
                "quota",
                "quota_bytes",
                "The maximum amount of space in bytes this dataset and its descendents can consume.",
                transform::numeric,
            ),
            (
                "recordsize",
                "recordsize",
                "Specifies a suggested block size for files in the file system.",
                transform::numeric,
            ),
            (
                "refcompressratio",
                "refcompressratio",
                "The compression ratio achieved for the referenced space of this dataset, expressed as a multiplier.",
                transform::multiplier,
            ),
            (
                "referenced",
                "referenced_bytes",
                "The amount of data in bytes that is accessible by this dataset, which may or may not be shared with other datasets in the pool.",
                transform::numeric,
            ),
            (
                "refquota",
                "referenced_quota_bytes",
                "The maximum amount of space in bytes this dataset can consume.",
                transform::numeric,
            ),
            (
                "refreservation",
                "referenced_reservation_bytes",
                "The minimum amount of space in bytes guaranteed to this dataset.",
                transform::numeric,
            ),
            (
                "relatime",
                "relatime",
                "Controls the manner in which the access time is updated when atime=on is set [0: off, 1: on].",
                transform::boolean,
            ),
            (
                "reservation",
                "reservation_bytes",
                "The minimum amount of space in bytes guaranteed to a dataset and its descendants.",
                transform::numeric,
            ),
            (
                "secondarycache",
                "secondarycache",
                "What is cached in the secondary cache (L2ARC) [1: all, 2: metadata, 0: none].",
                transform::cache_mode,
            ),
            (
                "snapshot_count",
                "snapshot_count_total",
                "The total number of snapshots that exist under this location in the dataset tree. This value is only available when a snapshot_limit has been set somewhere in the tree under which the dataset resides.",
                transform::numeric,
            ),
            (
                "snapshot_limit",
                "snapshot_limit_total",
                "The total limit on the number of snapshots that can be created on a dataset and its descendents.",
                transform::numeric,
            ),
            (
                "sync",
                "sync",
                "The sync behavior of this dataset [1: standard, 2: always, 0: disabled].",
                transform::sync,
            ),
            (
                "used",
                "used_bytes",
                "The amount of space in bytes consumed by this dataset and all its descendents.",
                transform::numeric,
            ),
            (
                "usedbychildren",
                "used_by_children_bytes",
                "The amount of space in bytes used by children of this dataset, which would be freed if all the dataset's children were destroyed.",
                transform::numeric,
            ),
            (
                "usedbydataset",
                "used_by_dataset_bytes",
                "The amount of space in bytes used by this dataset itself, which would be freed if the dataset were destroyed.",
                transform::numeric,
            ),
            (
                "usedbyrefreservation",
                "used_by_referenced_reservation_bytes",
                "The amount of space in bytes used by a refreservation set on this dataset, which would be freed if the refreservation was removed.",
                transform::numeric,
            ),
            (
                "usedbysnapshots",
                "used_by_snapshot_bytes",
                "The amount of space in bytes consumed by snapshots of this dataset.",
                transform::numeric,
            ),
            (
                "volsize",
                "volume_size_bytes",
                "The logical size in bytes of this volume.",
                transform::numeric,
            ),
            (
                "written",
                "written_bytes",
                "The amount of referenced space in bytes written to this dataset since the previous snapshot.",
                transform::numeric,
            ),
        ],
    )
});

pub static POOL_PROPERTIES: Lazy<PropertyStore> = Lazy::new(|| {
    store(
        Subsystem::Pool,
        POOL_LABELS,
        &[
            (
                "allocated",
                "allocated_bytes",
                "Amount of storage in bytes used within the pool.",
                transform::numeric,
            ),
            (
                "capacity",
                "capacity_ratio",
                "Ratio of pool space used.",
                transform::percentage,
            ),
            (
                "dedupratio",
                "deduplication_ratio",
                "The ratio of deduplicated size vs undeduplicated size for data in this pool.",
                transform::multiplier,
            ),
            (
                "expandsize",
                "expand_size_bytes",
                "Amount of uninitialized space within the pool or device that can be used to increase the total capacity of the pool.",
                transform::numeric,
            ),
            (
                "fragmentation",
                "fragmentation_ratio",
                "The fragmentation ratio of the pool.",
                transform::percentage,
            ),
            (
                "free",
                "free_bytes",
                "The amount of free space in bytes available in the pool.",
                transform::numeric,
            ),
            (
                "freeing",
                "freeing_bytes",
                "The amount of space in bytes remaining to be freed following the destruction of a file system or snapshot.",
                transform::numeric,
            ),
            (
                "health",
                "health",
                "Health status code for the pool [0: ONLINE, 1: DEGRADED, 2: FAULTED, 3: OFFLINE, 4: UNAVAIL, 5: REMOVED, 6: SUSPENDED].",
                transform::health_code,
            ),
            (
                "leaked",
                "leaked_bytes",
                "Number of leaked bytes in the pool.",
                transform::numeric,
            ),
            (
                "readonly",
                "readonly",
                "Read-only status of the pool [0: read-write, 1: read-only].",
                transform::boolean,
            ),
            (
                "size",
                "size_bytes",
                "Total size in bytes of the storage pool.",
                transform::numeric,
            ),
        ],
    )
});
