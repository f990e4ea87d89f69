//! The polling loop tying rules, sinks and the state store together.

use crate::config::{AgentConfig, RuleConfig};
use crate::file_source::FileAgeSource;
use crate::state_store::{JsonStateStore, StoredStates};
use chrono::{DateTime, Utc};
use delaymon_alert::engine::DelayAlertEngine;
use delaymon_notify::manager::AlertDispatcher;
use delaymon_notify::plugin::SinkRegistry;
use delaymon_notify::routing::SinkRoute;
use tokio::signal;
use tokio::time::{interval, Duration, Instant};

pub type RuleEngine = DelayAlertEngine<FileAgeSource>;

fn build_engine(rule: &RuleConfig) -> anyhow::Result<RuleEngine> {
    let target = rule.target()?;
    let engine = DelayAlertEngine::new(rule.engine_config()?, rule.age_source(), target)?;
    Ok(engine)
}

/// Builds one engine per rule. Misconfigured rules are logged and skipped.
pub fn build_engines(rules: &[RuleConfig]) -> Vec<RuleEngine> {
    rules
        .iter()
        .filter_map(|rule| match build_engine(rule) {
            Ok(engine) => Some(engine),
            Err(e) => {
                tracing::error!(rule = %rule.name, error = %e, "Invalid rule, skipped");
                None
            }
        })
        .collect()
}

/// Builds the sinks and their routes. Misconfigured sinks are logged and
/// skipped.
pub fn build_dispatcher(config: &AgentConfig, registry: &SinkRegistry) -> AlertDispatcher {
    let mut sinks = Vec::new();
    let mut routes = Vec::new();
    for sink_config in &config.sinks {
        match registry.create_sink(&sink_config.sink_type, &sink_config.config) {
            Ok(sink) => {
                routes.push(SinkRoute {
                    sink_index: sinks.len(),
                    labels: sink_config.labels.clone(),
                    mute_flapping: sink_config.mute_flapping,
                });
                sinks.push(sink);
            }
            Err(e) => {
                tracing::error!(sink = %sink_config.sink_type, error = %e, "Invalid sink, skipped");
            }
        }
    }
    if sinks.is_empty() {
        tracing::warn!("No alert sink configured, alerts will only be logged by the engine");
    }
    AlertDispatcher::new(sinks, routes)
}

/// Installs persisted states into the matching engines.
pub fn restore(engines: &mut [RuleEngine], mut stored: StoredStates) {
    for engine in engines.iter_mut() {
        if let Some(states) = stored.remove(engine.name()) {
            tracing::info!(rule = %engine.name(), entities = states.len(), "Restored rule states");
            engine.restore_states(states);
        }
    }
}

pub fn snapshot(engines: &[RuleEngine]) -> StoredStates {
    engines
        .iter()
        .map(|engine| (engine.name().to_string(), engine.states().clone()))
        .collect()
}

/// Drains up to `max_alerts` alerts from every engine and dispatches them.
/// Returns the number of alerts raised.
pub async fn run_tick(
    engines: &mut [RuleEngine],
    dispatcher: &AlertDispatcher,
    max_alerts: usize,
    now: DateTime<Utc>,
) -> usize {
    let mut raised = 0;
    for engine in engines.iter_mut() {
        for _ in 0..max_alerts {
            let Some(alert) = engine.poll_at(now) else {
                break;
            };
            raised += 1;
            dispatcher.dispatch(&alert).await;
        }
    }
    raised
}

fn refresh_catalogs(engines: &mut [RuleEngine]) {
    for engine in engines.iter_mut() {
        if let Err(e) = engine.refresh_entities() {
            tracing::warn!(rule = %engine.name(), error = %e, "Failed to refresh entities");
        }
    }
}

fn persist(store: Option<&JsonStateStore>, engines: &[RuleEngine]) {
    if let Some(store) = store {
        if let Err(e) = store.save(&snapshot(engines)) {
            tracing::error!(path = %store.path().display(), error = %e, "Failed to save rule states");
        }
    }
}

pub async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let registry = SinkRegistry::default();
    let dispatcher = build_dispatcher(&config, &registry);
    let mut engines = build_engines(&config.rules);
    if engines.is_empty() {
        anyhow::bail!("no valid rule configured");
    }

    let store = config.state_file.as_ref().map(JsonStateStore::new);
    if let Some(store) = &store {
        match store.load() {
            Ok(stored) => restore(&mut engines, stored),
            Err(e) => {
                tracing::warn!(path = %store.path().display(), error = %e, "Failed to load rule states, starting fresh");
            }
        }
    }

    let refresh_every = Duration::from_secs(config.catalog_refresh_secs.max(1));
    let mut last_refresh = Instant::now();
    let mut tick = interval(Duration::from_secs(config.tick_secs.max(1)));

    tracing::info!(
        rules = engines.len(),
        sinks = dispatcher.sinks().len(),
        tick_secs = config.tick_secs,
        "Starting polling loop"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if last_refresh.elapsed() >= refresh_every {
                    refresh_catalogs(&mut engines);
                    last_refresh = Instant::now();
                }

                let raised = run_tick(&mut engines, &dispatcher, config.max_alerts_per_tick, Utc::now()).await;
                if raised > 0 {
                    tracing::debug!(count = raised, "Alerts dispatched");
                    persist(store.as_ref(), &engines);
                }
            }
            _ = signal::ctrl_c() => {
                tracing::info!("Shutting down gracefully");
                persist(store.as_ref(), &engines);
                break;
            }
        }
    }

    Ok(())
}
