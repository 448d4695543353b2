//! Stack configuration.
//!
//! Loaded once at startup (TOML or defaults) and shared read-only across
//! entities as [`SharedConfig`].

pub mod stack_config;

pub use stack_config::*;
