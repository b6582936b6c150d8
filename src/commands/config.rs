//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("zfs-exporter.yaml"),
    };

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = add_config_comments(content);
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# ZFS Exporter Configuration
# ==========================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9134                       # HTTP port
#
# Collection
# ----------
# deadline_seconds: 8              # Serve cached values for collectors slower than this
# pools: null                      # Pool allowlist (null = all imported pools)
# excludes: null                   # Regular expressions matched against dataset names
# disable_exporter_metrics: false  # Drop zfs_scrape_collector_* metrics
#
# Logging
# -------
# log_level: "info"                # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false                # Enable HTTPS (default: false)
# tls_cert_path: null              # Path to TLS certificate (PEM format)
# tls_key_path: null               # Path to TLS private key (PEM format)
#
# Collectors
# ----------
# collectors:
#   dataset-filesystem: { enabled: true, properties: "available,used,..." }
#   dataset-snapshot:   { enabled: false }
#   dataset-volume:     { enabled: true }
#   pool:               { enabled: true, properties: "health,size,..." }
#
# Unknown properties are exported verbatim with a warning help text.
"#;

    format!("{comments}\n{yaml}")
}
