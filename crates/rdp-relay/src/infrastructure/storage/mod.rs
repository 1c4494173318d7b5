//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the optional TOML file, supplies defaults
//! for anything it leaves out, and can write the effective configuration
//! back out.

pub mod config;
