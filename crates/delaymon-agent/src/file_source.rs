//! Age source backed by a JSON export of the modification queue.

use chrono::{DateTime, Duration, Utc};
use delaymon_alert::error::SourceError;
use delaymon_alert::source::{AgeSource, EntityCatalog, PendingModification, ReferenceTimes};
use delaymon_common::types::EntityId;
use std::path::{Path, PathBuf};

/// Reads a JSON array of [`PendingModification`] records.
///
/// The file is read again on every query so that the rule always sees the
/// latest export. A missing file means an empty queue.
#[derive(Debug, Clone)]
pub struct FileAgeSource {
    path: PathBuf,
}

impl FileAgeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn references(&self) -> Result<ReferenceTimes, SourceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Source file missing, queue is empty");
                return Ok(ReferenceTimes::default());
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<PendingModification> = serde_json::from_str(&content)?;
        Ok(ReferenceTimes::from_pending(&records))
    }
}

impl AgeSource for FileAgeSource {
    fn age(&self, entity: EntityId, now: DateTime<Utc>) -> Result<Option<Duration>, SourceError> {
        self.references()?.age(entity, now)
    }
}

impl EntityCatalog for FileAgeSource {
    fn list_entities(&self) -> Result<Vec<EntityId>, SourceError> {
        self.references()?.list_entities()
    }
}
