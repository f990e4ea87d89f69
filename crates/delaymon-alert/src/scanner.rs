use delaymon_common::types::EntityId;

/// Result of one [`RoundRobinScanner::scan`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome<T> {
    /// First value produced by the visitor, if any
    pub found: Option<T>,
    /// Number of entities visited during this call
    pub visited: usize,
    /// The call finished a full lap over the entity list
    pub lap_completed: bool,
}

/// Resumable round-robin iteration over an entity list.
///
/// Each call visits at most one lap (and at most `batch_limit` entities when
/// set), stops on the first entity that yields a value and resumes from its
/// successor on the next call. A lap is the `len` visits starting from index
/// 0; when it completes the cursor goes back to 0.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinScanner {
    entities: Vec<EntityId>,
    cursor: usize,
    lap_visited: usize,
    batch_limit: Option<usize>,
}

impl RoundRobinScanner {
    pub fn new(entities: Vec<EntityId>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    /// Caps the number of entities visited per call. `0` is treated as `1`.
    pub fn with_batch_limit(mut self, batch_limit: Option<usize>) -> Self {
        self.batch_limit = batch_limit.map(|b| b.max(1));
        self
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Swaps the entity list without losing the lap in progress.
    ///
    /// An identical list keeps the cursor untouched. Otherwise the lap goes on
    /// from the first not-yet-visited entity that is still listed, at its
    /// position in the new list; when none is left a new lap starts.
    pub fn replace_entities(&mut self, entities: Vec<EntityId>) {
        if entities == self.entities {
            return;
        }

        // Within a lap the cursor equals the number of entities visited.
        let resume = if self.lap_visited == 0 {
            None
        } else {
            self.entities[self.cursor..]
                .iter()
                .find_map(|id| entities.iter().position(|e| e == id))
        };

        self.entities = entities;
        self.cursor = resume.unwrap_or(0);
        self.lap_visited = self.cursor;
    }

    pub fn scan<T>(&mut self, mut visit: impl FnMut(EntityId) -> Option<T>) -> ScanOutcome<T> {
        let len = self.entities.len();
        if len == 0 {
            self.cursor = 0;
            self.lap_visited = 0;
            return ScanOutcome {
                found: None,
                visited: 0,
                lap_completed: true,
            };
        }

        let remaining_in_lap = len - self.lap_visited;
        let budget = self
            .batch_limit
            .map_or(remaining_in_lap, |b| b.min(remaining_in_lap));

        let mut visited = 0;
        let mut found = None;
        while visited < budget {
            let entity = self.entities[self.cursor];
            self.cursor = (self.cursor + 1) % len;
            self.lap_visited += 1;
            visited += 1;

            if let Some(value) = visit(entity) {
                found = Some(value);
                break;
            }
        }

        let lap_completed = self.lap_visited >= len;
        if lap_completed {
            self.cursor = 0;
            self.lap_visited = 0;
        }

        ScanOutcome {
            found,
            visited,
            lap_completed,
        }
    }
}
