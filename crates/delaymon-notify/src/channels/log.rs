use crate::plugin::SinkPlugin;
use crate::AlertSink;
use anyhow::Result;
use async_trait::async_trait;
use delaymon_common::types::{DelayAlert, Direction};
use serde_json::Value;

/// Writes alerts to the tracing log.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn emit(&self, alert: &DelayAlert) -> Result<()> {
        match alert.direction {
            Direction::Down => tracing::warn!(
                rule = %alert.rule_name,
                entity_id = alert.entity_id,
                label = %alert.label,
                "{}",
                alert.summary()
            ),
            Direction::Up => tracing::info!(
                rule = %alert.rule_name,
                entity_id = alert.entity_id,
                label = %alert.label,
                "{}",
                alert.summary()
            ),
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "log"
    }
}

pub struct LogPlugin;

impl SinkPlugin for LogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    fn validate_config(&self, _config: &Value) -> crate::error::Result<()> {
        Ok(())
    }

    fn create_sink(&self, _config: &Value) -> crate::error::Result<Box<dyn AlertSink>> {
        Ok(Box::new(LogSink))
    }
}
