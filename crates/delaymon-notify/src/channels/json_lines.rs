use crate::error::NotifyError;
use crate::plugin::{parse_config, SinkPlugin};
use crate::AlertSink;
use anyhow::Result;
use async_trait::async_trait;
use delaymon_common::types::DelayAlert;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends each alert as one JSON object per line.
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AlertSink for JsonLinesSink {
    async fn emit(&self, alert: &DelayAlert) -> Result<()> {
        let mut line = serde_json::to_vec(alert).map_err(NotifyError::from)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(NotifyError::from)?;
        file.write_all(&line).await.map_err(NotifyError::from)?;
        file.flush().await.map_err(NotifyError::from)?;
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "json_lines"
    }
}

#[derive(Deserialize)]
struct JsonLinesConfig {
    path: PathBuf,
}

pub struct JsonLinesPlugin;

impl SinkPlugin for JsonLinesPlugin {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn validate_config(&self, config: &Value) -> crate::error::Result<()> {
        let cfg: JsonLinesConfig = parse_config("json_lines", config)?;
        if cfg.path.as_os_str().is_empty() {
            return Err(NotifyError::InvalidConfig("json_lines: empty path".to_string()));
        }
        Ok(())
    }

    fn create_sink(&self, config: &Value) -> crate::error::Result<Box<dyn AlertSink>> {
        let cfg: JsonLinesConfig = parse_config("json_lines", config)?;
        Ok(Box::new(JsonLinesSink::new(cfg.path)))
    }
}
