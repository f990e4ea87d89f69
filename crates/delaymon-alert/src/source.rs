//! Collaborators the engine consumes, plus in-memory implementations.

use crate::error::SourceError;
use chrono::{DateTime, Duration, Utc};
use delaymon_common::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reports the age of an entity's reference event.
pub trait AgeSource: Send + Sync {
    /// Elapsed time at `now` since the reference event of `entity`, or
    /// `None` when the entity has no reference event yet.
    fn age(&self, entity: EntityId, now: DateTime<Utc>) -> Result<Option<Duration>, SourceError>;
}

/// Enumerates the entities a multi-entity rule scans.
pub trait EntityCatalog: Send + Sync {
    fn list_entities(&self) -> Result<Vec<EntityId>, SourceError>;
}

/// A fixed entity list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<EntityId>);

impl EntityCatalog for StaticCatalog {
    fn list_entities(&self) -> Result<Vec<EntityId>, SourceError> {
        Ok(self.0.clone())
    }
}

/// Analysis status of a queued modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    New,
    Pending,
    Done,
    Error,
    Obsolete,
}

/// A modification waiting in a machine's (or the global) queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingModification {
    pub entity_id: EntityId,
    pub status: ModificationStatus,
    /// When the modification was queued
    pub date_time: DateTime<Utc>,
    /// End of the last (partial) analysis pass, for pending modifications
    #[serde(default)]
    pub analysis_end: Option<DateTime<Utc>>,
}

impl PendingModification {
    /// The time the delay is measured from.
    ///
    /// A new modification counts from when it was queued; a pending one from
    /// the end of its last analysis pass. Other statuses have no reference.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ModificationStatus::New => Some(self.date_time),
            ModificationStatus::Pending => Some(self.analysis_end.unwrap_or(self.date_time)),
            _ => None,
        }
    }
}

/// Reference timestamps per entity.
///
/// The age of an entity is `now - reference`; references in the future
/// yield an age of zero.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use delaymon_alert::source::{AgeSource, ReferenceTimes};
///
/// let now = Utc::now();
/// let mut refs = ReferenceTimes::default();
/// refs.set(1, now - Duration::seconds(90));
///
/// assert_eq!(refs.age(1, now).unwrap(), Some(Duration::seconds(90)));
/// assert_eq!(refs.age(2, now).unwrap(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReferenceTimes {
    references: BTreeMap<EntityId, DateTime<Utc>>,
}

impl ReferenceTimes {
    /// Keeps, per entity, the first pending modification: the earliest
    /// queued record whose status still has a reference time.
    pub fn from_pending(records: &[PendingModification]) -> Self {
        let mut first: BTreeMap<EntityId, &PendingModification> = BTreeMap::new();
        for record in records {
            if record.reference_time().is_none() {
                continue;
            }
            first
                .entry(record.entity_id)
                .and_modify(|current| {
                    if record.date_time < current.date_time {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        let references = first
            .into_iter()
            .filter_map(|(id, record)| record.reference_time().map(|t| (id, t)))
            .collect();
        Self { references }
    }

    pub fn set(&mut self, entity: EntityId, reference: DateTime<Utc>) {
        self.references.insert(entity, reference);
    }

    pub fn clear(&mut self, entity: EntityId) {
        self.references.remove(&entity);
    }

    pub fn get(&self, entity: EntityId) -> Option<DateTime<Utc>> {
        self.references.get(&entity).copied()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

impl AgeSource for ReferenceTimes {
    fn age(&self, entity: EntityId, now: DateTime<Utc>) -> Result<Option<Duration>, SourceError> {
        let Some(reference) = self.get(entity) else {
            return Ok(None);
        };
        if reference > now {
            tracing::warn!(
                entity_id = entity,
                reference = %reference,
                "Reference time is in the future, using a zero age"
            );
            return Ok(Some(Duration::zero()));
        }
        Ok(Some(now - reference))
    }
}

impl EntityCatalog for ReferenceTimes {
    fn list_entities(&self) -> Result<Vec<EntityId>, SourceError> {
        Ok(self.references.keys().copied().collect())
    }
}
