//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the metrics endpoint and the collector setup.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let collectors: String = state
        .collector
        .states()
        .iter()
        .map(|s| {
            format!(
                "        <tr><td><code>{}</code></td><td>{}</td><td>{}</td></tr>\n",
                s.name(),
                if s.enabled { "enabled" } else { "disabled" },
                s.properties
            )
        })
        .collect();

    let pools = if state.collector.pools().is_empty() {
        "all".to_string()
    } else {
        state.collector.pools().join(", ")
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ZFS Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info-label {{
            font-weight: 600;
            color: #555;
        }}
        table {{
            border-collapse: collapse;
            width: 100%;
        }}
        td, th {{
            text-align: left;
            padding: 6px 10px;
            border-bottom: 1px solid #ddd;
        }}
        code {{
            background: #e9ecef;
            padding: 2px 6px;
            border-radius: 3px;
            font-family: 'Courier New', monospace;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>ZFS Exporter</h1>
    <p>
        <span class="info-label">Version</span> {version} &middot;
        <span class="info-label">Uptime</span> {uptime} &middot;
        <span class="info-label">Deadline</span> {deadline}s &middot;
        <span class="info-label">Pools</span> {pools}
    </p>
    <p><a href="/metrics">/metrics</a> &mdash; Prometheus-compatible metrics endpoint</p>
    <p><a href="/config">/config</a> &mdash; Effective configuration</p>

    <h2>Collectors</h2>
    <table>
        <tr><th>Name</th><th>State</th><th>Properties</th></tr>
{collectors}    </table>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        deadline = state.collector.deadline().as_secs(),
        pools = pools,
        collectors = collectors,
    );

    Html(html)
}
