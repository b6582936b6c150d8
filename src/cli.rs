//! CLI arguments and subcommands for zfs-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "zfs-exporter",
    about = "Prometheus exporter for ZFS pool and dataset properties",
    long_about = "Prometheus exporter for ZFS pool and dataset properties.\n\n\
                  Collects numeric properties of pools, filesystems, snapshots and volumes \
                  through the zpool and zfs tools. Collections are bounded by a deadline; \
                  values that are late or failed are served from the last good collection.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Maximum collection duration in seconds before cached values are served
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Only collect these pools (repeatable, default: all pools)
    #[arg(long = "pool", value_name = "POOL")]
    pub pools: Vec<String>,

    /// Exclude datasets whose name matches this regular expression (repeatable)
    #[arg(long = "exclude", value_name = "REGEX")]
    pub excludes: Vec<String>,

    /// Disable the zfs_scrape_collector_* metrics
    #[arg(long)]
    pub disable_exporter_metrics: bool,

    /// Enable a collector by name (repeatable)
    #[arg(long = "enable-collector", value_name = "NAME")]
    pub enable_collectors: Vec<String>,

    /// Disable a collector by name (repeatable)
    #[arg(long = "disable-collector", value_name = "NAME")]
    pub disable_collectors: Vec<String>,

    /// Override the property list of a collector, e.g. pool=size,health (repeatable)
    #[arg(long = "properties", value_name = "NAME=LIST", value_parser = parse_properties)]
    pub properties: Vec<(String, String)>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

fn parse_properties(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, props)) if !name.is_empty() => Ok((name.to_string(), props.to_string())),
        _ => Err(format!("expected <collector>=<properties>, got '{s}'")),
    }
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the zpool and zfs tools are usable
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// List every metric family the enabled collectors export
    Describe {
        /// Include collectors that are disabled
        #[arg(long)]
        all: bool,
    },

    /// List discovered and selected pools
    Pools,

    /// Run collection cycles and print the result
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every sample in exposition format
        #[arg(long)]
        verbose: bool,
    },
}
