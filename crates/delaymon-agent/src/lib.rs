//! Delay alerting daemon: loads rules and sinks from TOML, polls every rule
//! on a fixed tick and persists rule states between runs.

pub mod config;
pub mod file_source;
pub mod runner;
pub mod state_store;
