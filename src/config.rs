//! Configuration management for zfs-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zfs_exporter::{Client, CollectorKind, ZfsCollector, ZfsConfig};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9134;
pub const DEFAULT_DEADLINE_SECONDS: u64 = 8;
pub const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Per-collector overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub enabled: Option<bool>,
    /// Comma-separated property keys
    pub properties: Option<String>,
}

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection
    #[serde(alias = "deadline-seconds")]
    pub deadline_seconds: Option<u64>,
    pub pools: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    #[serde(alias = "disable-exporter-metrics")]
    pub disable_exporter_metrics: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Collector overrides, keyed by collector name (e.g. `dataset-snapshot`).
    // Must stay the last field: TOML tables follow plain values.
    pub collectors: Option<BTreeMap<String, CollectorConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        let collectors = CollectorKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.name().to_string(),
                    CollectorConfig {
                        enabled: Some(kind.default_enabled()),
                        properties: Some(kind.default_properties().to_string()),
                    },
                )
            })
            .collect();

        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            deadline_seconds: Some(DEFAULT_DEADLINE_SECONDS),
            pools: None,
            excludes: None,
            disable_exporter_metrics: Some(false),
            collectors: Some(collectors),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds.unwrap_or(DEFAULT_DEADLINE_SECONDS))
    }

    /// Builds the collector described by this configuration.
    pub fn build_collector(
        &self,
        client: Arc<dyn Client>,
    ) -> Result<ZfsCollector, Box<dyn std::error::Error>> {
        let collector = ZfsCollector::new(ZfsConfig {
            disable_metrics: self.disable_exporter_metrics.unwrap_or(false),
            deadline: self.deadline(),
            pools: self.pools.clone().unwrap_or_default(),
            excludes: self.excludes.clone().unwrap_or_default(),
            client,
        })?;

        for (name, overrides) in self.collectors.iter().flatten() {
            if let Some(enabled) = overrides.enabled {
                collector.set_enabled(name, enabled)?;
            }
            if let Some(props) = &overrides.properties {
                collector.set_properties(name, props)?;
            }
        }
        Ok(collector)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.deadline_seconds == Some(0) {
        return Err("deadline_seconds must be greater than zero".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{}', expected one of: {}",
                level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
    }

    for pattern in cfg.excludes.iter().flatten() {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(format!("Invalid exclude pattern '{}': {}", pattern, e).into());
        }
    }

    for name in cfg.collectors.iter().flat_map(|c| c.keys()) {
        if CollectorKind::from_name(name).is_none() {
            let known: Vec<_> = CollectorKind::ALL.iter().map(|k| k.name()).collect();
            return Err(format!(
                "Unknown collector '{}', expected one of: {}",
                name,
                known.join(", ")
            )
            .into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("TLS {} file not found: {}", what, path).into());
    }
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Collection settings
    if let Some(deadline) = args.deadline {
        config.deadline_seconds = Some(deadline);
    }
    if !args.pools.is_empty() {
        config.pools = Some(args.pools.clone());
    }
    if !args.excludes.is_empty() {
        config.excludes = Some(args.excludes.clone());
    }
    if args.disable_exporter_metrics {
        config.disable_exporter_metrics = Some(true);
    }

    // Collector overrides: CLI wins if provided
    let mut overrides: HashMap<&str, CollectorConfig> = HashMap::new();
    for name in &args.enable_collectors {
        overrides.entry(name.as_str()).or_default().enabled = Some(true);
    }
    for name in &args.disable_collectors {
        overrides.entry(name.as_str()).or_default().enabled = Some(false);
    }
    for (name, props) in &args.properties {
        overrides.entry(name.as_str()).or_default().properties = Some(props.clone());
    }
    if !overrides.is_empty() {
        let collectors = config.collectors.get_or_insert_with(BTreeMap::new);
        for (name, o) in overrides {
            let entry = collectors.entry(name.to_string()).or_default();
            if o.enabled.is_some() {
                entry.enabled = o.enabled;
            }
            if o.properties.is_some() {
                entry.properties = o.properties;
            }
        }
    }

    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/zfs-exporter/zfs-exporter.yaml",
            "/etc/zfs-exporter/zfs-exporter.yml",
            "/etc/zfs-exporter/zfs-exporter.json",
            "./zfs-exporter.yaml",
            "./zfs-exporter.yml",
            "./zfs-exporter.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}
