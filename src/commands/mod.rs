//! CLI command implementations for zfs-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `describe`: Metric family listing
//! - `pools`: Pool discovery
//! - `test`: Collection testing

pub mod check;
pub mod config;
pub mod describe;
pub mod pools;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use describe::command_describe;
pub use pools::command_pools;
pub use test::command_test;
