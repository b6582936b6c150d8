//! Test command implementation.
//!
//! Runs collection cycles against the local pools and displays results.

use ahash::AHashMap as HashMap;
use std::sync::Arc;
use std::time::Instant;
use zfs_exporter::{encode, CommandClient};

use crate::config::Config;

/// Runs `iterations` collection cycles and summarizes each one.
pub async fn command_test(
    iterations: usize,
    verbose: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 ZFS Exporter - Test Mode");
    println!("===========================");

    let collector = config.build_collector(Arc::new(CommandClient::new()))?;

    for iteration in 1..=iterations {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations);

        let start = Instant::now();
        let samples = collector.scrape().await;
        let duration = start.elapsed();

        let mut families: HashMap<&str, usize> = HashMap::new();
        for sample in &samples {
            *families.entry(sample.name()).or_default() += 1;
        }
        println!(
            "   ⏱️  Collection duration: {:.2}ms",
            duration.as_secs_f64() * 1000.0
        );
        println!(
            "   📊 {} samples in {} families",
            samples.len(),
            families.len()
        );

        for sample in samples
            .iter()
            .filter(|s| s.name() == "zfs_scrape_collector_success")
        {
            let name = sample.label("collector").unwrap_or("?");
            let status = if sample.value == 1.0 { "✅" } else { "❌" };
            println!("   ├─ {} {}", status, name);
        }

        if verbose {
            print!("{}", encode(&samples)?);
        }
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}
