//! CLI command implementations for druid-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `config`: Configuration file generation
//! - `test`: One-off scrapes against Druid

pub mod config;

// Re-export command functions
pub use config::command_config;
pub use test::command_test;
