use crate::error::{NotifyError, Result};
use crate::AlertSink;
use serde_json::Value;
use std::collections::HashMap;

/// Factory for [`AlertSink`] instances built from JSON configuration.
pub trait SinkPlugin: Send + Sync {
    /// The sink type name (e.g. `"webhook"`).
    fn name(&self) -> &str;

    /// Checks a config blob against this plugin's expected schema.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Builds a sink from a validated config.
    fn create_sink(&self, config: &Value) -> Result<Box<dyn AlertSink>>;
}

/// Registry of available [`SinkPlugin`]s.
///
/// # Examples
///
/// ```
/// use delaymon_notify::plugin::SinkRegistry;
///
/// let registry = SinkRegistry::default();
/// assert!(registry.has_plugin("log"));
/// assert!(registry.has_plugin("json_lines"));
/// assert!(registry.has_plugin("webhook"));
/// assert!(!registry.has_plugin("nonexistent"));
/// ```
pub struct SinkRegistry {
    plugins: HashMap<String, Box<dyn SinkPlugin>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn SinkPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    pub fn create_sink(&self, type_name: &str, config: &Value) -> Result<Box<dyn AlertSink>> {
        let plugin = self
            .plugins
            .get(type_name)
            .ok_or_else(|| NotifyError::UnknownSinkType(type_name.to_string()))?;
        plugin.validate_config(config)?;
        plugin.create_sink(config)
    }

    pub fn has_plugin(&self, type_name: &str) -> bool {
        self.plugins.contains_key(type_name)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::channels::log::LogPlugin));
        registry.register(Box::new(crate::channels::json_lines::JsonLinesPlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry
    }
}

/// Deserializes a plugin config, mapping errors to [`NotifyError::InvalidConfig`].
pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(kind: &str, config: &Value) -> Result<T> {
    // A sink declared without a config table arrives as null.
    let config = if config.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        config.clone()
    };
    serde_json::from_value(config)
        .map_err(|e| NotifyError::InvalidConfig(format!("{kind}: {e}")))
}
