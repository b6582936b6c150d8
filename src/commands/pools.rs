//! Pools command implementation.
//!
//! Shows which pools a collection would inspect.

use zfs_exporter::{Client, CommandClient};

use crate::config::Config;

/// Lists discovered pools and marks the ones selected by the configuration.
pub fn command_pools(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let discovered = CommandClient::new().pool_names()?;
    let wanted = config.pools.clone().unwrap_or_default();

    println!("🗄️  ZFS Exporter - Pools");
    println!("=======================");
    for pool in &discovered {
        let selected = wanted.is_empty() || wanted.contains(pool);
        println!("   {} {}", if selected { "✅" } else { "➖" }, pool);
    }
    for pool in wanted.iter().filter(|p| !discovered.contains(p)) {
        println!("   ❌ {} (configured, not imported)", pool);
    }
    Ok(())
}
