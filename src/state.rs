//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use std::sync::Arc;
use std::time::Instant;
use zfs_exporter::ZfsCollector;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub collector: ZfsCollector,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(collector: ZfsCollector, config: Config) -> Self {
        Self {
            collector,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
