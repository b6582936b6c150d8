//! ZFS Property Exporter Library
//!
//! This library collects numeric ZFS pool and dataset properties and renders
//! them as Prometheus gauges. It is framework-agnostic: the binary wires it
//! into an HTTP server, but any caller can drive a collection cycle.
//!
//! # Features
//!
//! - **Property Registry**: Known properties map to typed metrics with value transforms
//! - **Concurrent Collection**: One task per enabled collector, one per pool
//! - **Deadline Fallback**: Late or failed values are served from the last good cycle
//! - **Readiness Gate**: Overlapping requests are answered from cache
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zfs_exporter::{encode, CommandClient, ZfsCollector, ZfsConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let collector = ZfsCollector::new(ZfsConfig::new(Arc::new(CommandClient::new())))?;
//! collector.set_enabled("dataset-snapshot", true)?;
//!
//! let samples = collector.scrape().await;
//! print!("{}", encode(&samples)?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collectors;
pub mod property;
pub mod sample;
pub mod transform;
pub mod zfs;
pub mod zfs_collector;

// Re-export main types for convenience
pub use cache::MetricCache;
pub use collectors::{CollectError, CollectorKind, CollectorState};
pub use sample::{encode, MetricDesc, Sample};
pub use zfs::{Client, CommandClient, DatasetKind, ZfsError};
pub use zfs_collector::{BuildError, ZfsCollector, ZfsConfig, DEFAULT_DEADLINE};
