//! Alert delivery with pluggable sinks.
//!
//! Delay alerts produced by the engine are fanned out to one or more
//! [`AlertSink`] implementations. Built-in sinks write to the log, append
//! JSON lines to a file, or POST to a webhook.

pub mod channels;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod routing;
pub mod utils;


use anyhow::Result;
use async_trait::async_trait;
use delaymon_common::types::DelayAlert;

/// Consumes delay alerts (log, file, HTTP endpoint, ...).
///
/// The engine never retries delivery; a sink that wants retries does them
/// itself.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers the alert.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery failed (after the sink's own retries).
    async fn emit(&self, alert: &DelayAlert) -> Result<()>;

    /// The sink type name (e.g. `"log"`, `"webhook"`).
    fn sink_name(&self) -> &str;
}
