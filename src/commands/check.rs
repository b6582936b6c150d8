//! Check command implementation.
//!
//! Validates that the ZFS tools answer and that the configuration is valid.

use zfs_exporter::{Client, CommandClient, DatasetKind};

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 ZFS Exporter - System Check");
    println!("==============================");

    let mut all_ok = true;
    let client = CommandClient::new();

    println!("\n🗄️  Checking zpool...");
    let pools = match client.pool_names() {
        Ok(pools) => {
            println!("   ✅ zpool answered, {} pool(s) imported", pools.len());
            pools
        }
        Err(e) => {
            println!("   ❌ Cannot list pools: {}", e);
            all_ok = false;
            Vec::new()
        }
    };

    if let Some(pool) = pools.first() {
        match client.pool(pool).properties(&["health".to_string()]) {
            Ok(props) => println!(
                "   ✅ Pool '{}' health: {}",
                pool,
                props.properties().get("health").map_or("unknown", String::as_str)
            ),
            Err(e) => {
                println!("   ❌ Cannot read properties of pool '{}': {}", pool, e);
                all_ok = false;
            }
        }

        println!("\n📁 Checking zfs...");
        match client
            .datasets(pool, DatasetKind::Filesystem)
            .properties(&["used".to_string()])
        {
            Ok(datasets) => println!(
                "   ✅ zfs answered, {} filesystem(s) in pool '{}'",
                datasets.len(),
                pool
            ),
            Err(e) => {
                println!("   ❌ Cannot read datasets of pool '{}': {}", pool, e);
                all_ok = false;
            }
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
