//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the effective exporter configuration.

use axum::{extract::State, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    render_config(&state.config)
}

fn list_or(values: Option<&Vec<String>>, empty: &str) -> String {
    match values {
        Some(values) if !values.is_empty() => values.join(", "),
        _ => empty.to_string(),
    }
}

/// Plain-text rendering of the effective configuration.
pub fn render_config(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "ZFS EXPORTER - CONFIGURATION").ok();
    writeln!(out, "============================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "TLS/SSL CONFIGURATION").ok();
    writeln!(out, "---------------------").ok();
    writeln!(
        out,
        "enable_tls:                 {}",
        cfg.enable_tls.unwrap_or(false)
    )
    .ok();
    writeln!(
        out,
        "tls_cert_path:              {}",
        cfg.tls_cert_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "tls_key_path:               {}",
        cfg.tls_key_path.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "COLLECTION").ok();
    writeln!(out, "----------").ok();
    writeln!(
        out,
        "deadline_seconds:           {}",
        cfg.deadline().as_secs()
    )
    .ok();
    writeln!(
        out,
        "pools:                      {}",
        list_or(cfg.pools.as_ref(), "all")
    )
    .ok();
    writeln!(
        out,
        "excludes:                   {}",
        list_or(cfg.excludes.as_ref(), "none")
    )
    .ok();
    writeln!(
        out,
        "disable_exporter_metrics:   {}",
        cfg.disable_exporter_metrics.unwrap_or(false)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "COLLECTOR OVERRIDES").ok();
    writeln!(out, "-------------------").ok();
    for (name, overrides) in cfg.collectors.iter().flatten() {
        let enabled = overrides
            .enabled
            .map_or("default".to_string(), |e| e.to_string());
        writeln!(
            out,
            "{:<27} enabled={} properties={}",
            format!("{name}:"),
            enabled,
            overrides.properties.as_deref().unwrap_or("default")
        )
        .ok();
    }

    out
}
