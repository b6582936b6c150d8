//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/config`: Effective configuration
//! - `/`: Landing page

pub mod config;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use config::config_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
