//! Describe command implementation.
//!
//! Lists the metric families the configured collectors export.

use std::sync::Arc;
use zfs_exporter::CommandClient;

use crate::config::Config;

/// Prints every exported metric family with its labels and help text.
pub fn command_describe(all: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let collector = config.build_collector(Arc::new(CommandClient::new()))?;
    if all {
        for state in collector.states() {
            collector.set_enabled(state.name(), true)?;
        }
    }

    println!("📋 ZFS Exporter - Metric Families");
    println!("=================================");
    for state in collector.states() {
        let marker = if state.enabled { "✅" } else { "⏸️ " };
        println!("{} {:<20} {}", marker, state.name(), state.properties);
    }
    println!();

    for desc in collector.describe() {
        println!("{}{{{}}}", desc.fq_name, desc.labels.join(","));
        println!("   {}", desc.help);
    }
    Ok(())
}
