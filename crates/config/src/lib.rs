//! Configuration module for the batch compressor
//!
//! Handles loading configuration from TOML or JSON files, required-key checks
//! and environment variable overrides.

pub mod config;

pub use config::*;
