use delaymon_alert::engine::{EngineConfig, Target};
use delaymon_alert::error::AlertError;
use delaymon_alert::evaluator::DEFAULT_MARGIN;
use delaymon_alert::source::StaticCatalog;
use delaymon_common::timespan;
use delaymon_common::types::EntityId;
use serde::Deserialize;
use std::path::PathBuf;

use crate::file_source::FileAgeSource;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Upper bound on alerts drained from one rule per tick
    #[serde(default = "default_max_alerts_per_tick")]
    pub max_alerts_per_tick: usize,
    /// How often catalog-backed rules list their entities again
    #[serde(default = "default_catalog_refresh_secs")]
    pub catalog_refresh_secs: u64,
    /// Where rule states are persisted; `None` disables persistence
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_tick_secs() -> u64 {
    10
}

fn default_max_alerts_per_tick() -> usize {
    32
}

fn default_catalog_refresh_secs() -> u64 {
    300
}

fn default_margin() -> i64 {
    DEFAULT_MARGIN
}

#[derive(Debug, Deserialize)]
pub struct SinkConfig {
    /// Registered sink type (`log`, `json_lines`, `webhook`)
    #[serde(rename = "type")]
    pub sink_type: String,
    /// Only forward these bucket labels; empty forwards everything
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub mute_flapping: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// e.g. `"0:00:30=WARNING;0:01:00=ERROR"`
    pub thresholds: String,
    #[serde(default = "default_margin")]
    pub margin: i64,
    /// TimeSpan literal, defaults to 10 seconds
    pub flapping_threshold: Option<String>,
    /// TimeSpan literal, defaults depend on the target
    pub frequency: Option<String>,
    /// JSON file of pending modification records
    pub source: PathBuf,
    /// Watch a single entity
    pub entity: Option<EntityId>,
    /// Watch a fixed list of entities
    pub entities: Option<Vec<EntityId>>,
    pub batch_limit: Option<usize>,
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

impl RuleConfig {
    pub fn engine_config(&self) -> Result<EngineConfig, AlertError> {
        let mut config = EngineConfig::new(&self.name, &self.thresholds);
        config.margin = self.margin;
        config.batch_limit = self.batch_limit;
        if let Some(literal) = &self.flapping_threshold {
            config.flapping_threshold = parse_duration("flapping_threshold", literal)?;
        }
        if let Some(literal) = &self.frequency {
            config.frequency = Some(parse_duration("frequency", literal)?);
        }
        Ok(config)
    }

    pub fn age_source(&self) -> FileAgeSource {
        FileAgeSource::new(&self.source)
    }

    /// A single `entity`, a fixed `entities` list, or every entity found in
    /// the source file when neither is set.
    pub fn target(&self) -> anyhow::Result<Target> {
        match (self.entity, &self.entities) {
            (Some(_), Some(_)) => anyhow::bail!(
                "rule '{}': 'entity' and 'entities' are mutually exclusive",
                self.name
            ),
            (Some(id), None) => Ok(Target::Single(id)),
            (None, Some(ids)) => Ok(Target::Catalog(Box::new(StaticCatalog(ids.clone())))),
            (None, None) => Ok(Target::Catalog(Box::new(self.age_source()))),
        }
    }
}

fn parse_duration(field: &'static str, literal: &str) -> Result<chrono::Duration, AlertError> {
    timespan::parse(literal).map_err(|source| AlertError::InvalidDuration { field, source })
}
