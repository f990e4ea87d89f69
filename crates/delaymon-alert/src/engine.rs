use crate::error::{AlertError, SourceError};
use crate::evaluator::{default_flapping_threshold, DelayEvaluator, DEFAULT_MARGIN};
use crate::scanner::RoundRobinScanner;
use crate::source::{AgeSource, EntityCatalog};
use crate::state::EntityDelayState;
use crate::threshold::ThresholdTable;
use chrono::{DateTime, Duration, Utc};
use delaymon_common::types::{DelayAlert, EntityId};
use std::collections::HashMap;

/// Default minimum time between two scan laps of a multi-entity rule.
pub fn default_fleet_frequency() -> Duration {
    Duration::minutes(3)
}

/// What a rule watches.
pub enum Target {
    /// One fixed entity (e.g. the global modification queue).
    Single(EntityId),
    /// Every entity listed by the catalog, scanned round-robin. The catalog
    /// is queried on the first poll and on [`DelayAlertEngine::refresh_entities`].
    Catalog(Box<dyn EntityCatalog>),
}

impl Target {
    fn default_frequency(&self) -> Duration {
        match self {
            Target::Single(_) => Duration::zero(),
            Target::Catalog(_) => default_fleet_frequency(),
        }
    }
}

/// Settings of one delay rule.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Threshold definition, e.g. `"0:00:30=WARNING;0:01:00=ERROR"`
    pub thresholds: String,
    /// Percentage in `[0, 100)`
    pub margin: i64,
    pub flapping_threshold: Duration,
    /// Minimum time between scan laps; `None` picks the target's default
    pub frequency: Option<Duration>,
    /// Entities visited per poll at most; `None` means a full lap
    pub batch_limit: Option<usize>,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>, thresholds: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thresholds: thresholds.into(),
            margin: DEFAULT_MARGIN,
            flapping_threshold: default_flapping_threshold(),
            frequency: None,
            batch_limit: None,
        }
    }
}

/// Delay threshold alerting for one rule.
///
/// Each [`poll`](Self::poll) asks the age source about entities in
/// round-robin order and returns the first severity change it finds. After a
/// full lap over the entities, further polls return nothing until
/// `frequency` has elapsed.
///
/// The engine is not internally synchronized; callers serialize polls.
pub struct DelayAlertEngine<S> {
    name: String,
    table: ThresholdTable,
    evaluator: DelayEvaluator,
    frequency: Duration,
    batch_limit: Option<usize>,
    target: Target,
    source: S,
    scanner: Option<RoundRobinScanner>,
    states: HashMap<EntityId, EntityDelayState>,
    last_lap_at: Option<DateTime<Utc>>,
}

impl<S: AgeSource> DelayAlertEngine<S> {
    pub fn new(config: EngineConfig, source: S, target: Target) -> Result<Self, AlertError> {
        let evaluator = DelayEvaluator::new(config.margin, config.flapping_threshold)?;
        let table = ThresholdTable::parse(&config.thresholds);
        if table.is_empty() {
            tracing::warn!(rule = %config.name, "No valid thresholds, the rule will never fire");
        }

        let frequency = config
            .frequency
            .unwrap_or_else(|| target.default_frequency());
        let scanner = match &target {
            Target::Single(id) => Some(RoundRobinScanner::new(vec![*id])),
            Target::Catalog(_) => None,
        };

        tracing::debug!(
            rule = %config.name,
            thresholds = %table,
            margin = config.margin,
            "Delay rule configured"
        );

        Ok(Self {
            name: config.name,
            table,
            evaluator,
            frequency,
            batch_limit: config.batch_limit,
            target,
            source,
            scanner: scanner.map(|s| s.with_batch_limit(config.batch_limit)),
            states: HashMap::new(),
            last_lap_at: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &ThresholdTable {
        &self.table
    }

    pub fn margin(&self) -> u8 {
        self.evaluator.margin()
    }

    pub fn flapping_threshold(&self) -> Duration {
        self.evaluator.flapping_threshold()
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Entities currently scanned, empty until the catalog has been listed.
    pub fn entities(&self) -> &[EntityId] {
        self.scanner
            .as_ref()
            .map(RoundRobinScanner::entities)
            .unwrap_or_default()
    }

    pub fn state(&self, entity: EntityId) -> Option<&EntityDelayState> {
        self.states.get(&entity)
    }

    pub fn states(&self) -> &HashMap<EntityId, EntityDelayState> {
        &self.states
    }

    /// Installs previously persisted states, re-aligned on the current table.
    pub fn restore_states(&mut self, states: HashMap<EntityId, EntityDelayState>) {
        for (entity, mut state) in states {
            state.reset_next_threshold(&self.table);
            self.states.insert(entity, state);
        }
    }

    /// Replaces the threshold table and re-aligns every live state on it.
    pub fn set_thresholds(&mut self, definition: &str) {
        self.table = ThresholdTable::parse(definition);
        for state in self.states.values_mut() {
            state.reset_next_threshold(&self.table);
        }
        tracing::info!(rule = %self.name, thresholds = %self.table, "Thresholds updated");
    }

    /// Lists the catalog again. A no-op for single-entity rules.
    pub fn refresh_entities(&mut self) -> Result<(), SourceError> {
        let Target::Catalog(catalog) = &self.target else {
            return Ok(());
        };
        let entities = catalog.list_entities()?;
        tracing::debug!(rule = %self.name, count = entities.len(), "Entity list refreshed");
        match &mut self.scanner {
            Some(scanner) => scanner.replace_entities(entities),
            None => {
                self.scanner =
                    Some(RoundRobinScanner::new(entities).with_batch_limit(self.batch_limit));
            }
        }
        Ok(())
    }

    pub fn poll(&mut self) -> Option<DelayAlert> {
        self.poll_at(Utc::now())
    }

    pub fn poll_at(&mut self, now: DateTime<Utc>) -> Option<DelayAlert> {
        if let Some(last) = self.last_lap_at {
            let next_check = last + self.frequency;
            if now < next_check {
                tracing::debug!(
                    rule = %self.name,
                    next_check = %next_check,
                    "Scan frequency not reached"
                );
                return None;
            }
        }

        if self.scanner.is_none() {
            if let Err(e) = self.refresh_entities() {
                tracing::warn!(rule = %self.name, error = %e, "Failed to list entities");
                return None;
            }
        }

        let name = self.name.as_str();
        let table = &self.table;
        let evaluator = &self.evaluator;
        let source = &self.source;
        let states = &mut self.states;
        let scanner = self.scanner.as_mut()?;

        let outcome = scanner.scan(|entity| {
            let age = match source.age(entity, now) {
                Ok(Some(age)) => age,
                Ok(None) => {
                    tracing::debug!(rule = %name, entity_id = entity, "No reference event");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(rule = %name, entity_id = entity, error = %e, "Age query failed");
                    return None;
                }
            };

            let state = states
                .entry(entity)
                .or_insert_with(|| EntityDelayState::new(table));
            evaluator
                .evaluate(table, age, state, now)
                .map(|transition| transition.into_alert(name, entity))
        });

        if outcome.lap_completed {
            self.last_lap_at = Some(now);
        }

        match &outcome.found {
            Some(alert) => tracing::info!(
                rule = %self.name,
                entity_id = alert.entity_id,
                direction = %alert.direction,
                label = %alert.label,
                flapping = alert.flapping,
                "Delay alert raised"
            ),
            None => tracing::debug!(
                rule = %self.name,
                visited = outcome.visited,
                lap_completed = outcome.lap_completed,
                "No alert this round"
            ),
        }

        outcome.found
    }
}
