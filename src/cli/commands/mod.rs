//! Subcommand implementations.

/// `config` command: prints the resolved configuration.
pub mod config;
