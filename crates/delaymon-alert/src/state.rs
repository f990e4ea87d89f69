use crate::threshold::ThresholdTable;
use chrono::{DateTime, Duration, Utc};
use delaymon_common::timespan::{serde_timespan, serde_timespan_opt};
use serde::{Deserialize, Serialize};

/// Per-entity delay tracking state.
///
/// Created on the first age observation for an entity and only ever mutated
/// by [`crate::evaluator::DelayEvaluator`]. Serializable so that a host can
/// persist it across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDelayState {
    /// Lower bound of the currently active bucket
    #[serde(with = "serde_timespan")]
    pub reached_threshold: Duration,
    /// Lower bound of the bucket above, `None` meaning infinite
    #[serde(with = "serde_timespan_opt")]
    pub next_threshold: Option<Duration>,
    /// Bucket reached before the last emission
    #[serde(with = "serde_timespan")]
    pub previous_threshold: Duration,
    /// Time of the emission before the last one
    pub previous_emission_time: DateTime<Utc>,
    pub last_emission_time: DateTime<Utc>,
    pub flapping: bool,
    pub begin_flapping: bool,
}

impl EntityDelayState {
    /// Fresh state: OK bucket, never emitted.
    pub fn new(table: &ThresholdTable) -> Self {
        Self {
            reached_threshold: Duration::zero(),
            next_threshold: table.next_above(Duration::zero()),
            previous_threshold: Duration::zero(),
            previous_emission_time: DateTime::<Utc>::UNIX_EPOCH,
            last_emission_time: DateTime::<Utc>::UNIX_EPOCH,
            flapping: false,
            begin_flapping: false,
        }
    }

    /// Recomputes `next_threshold` against a (possibly new) table.
    pub fn reset_next_threshold(&mut self, table: &ThresholdTable) {
        self.next_threshold = table.next_above(self.reached_threshold);
    }

    /// Whether `age` is above the next bucket boundary.
    pub fn is_beyond_next(&self, age: Duration) -> bool {
        self.next_threshold.is_some_and(|next| age > next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_points_at_lowest_threshold() {
        let table = ThresholdTable::parse("0:01:00=WARN;0:10:00=CRIT");
        let state = EntityDelayState::new(&table);
        assert_eq!(state.reached_threshold, Duration::zero());
        assert_eq!(state.next_threshold, Some(Duration::minutes(1)));
        assert_eq!(state.last_emission_time, DateTime::<Utc>::UNIX_EPOCH);
        assert!(!state.flapping);
    }

    #[test]
    fn new_state_with_empty_table_is_unbounded() {
        let state = EntityDelayState::new(&ThresholdTable::default());
        assert_eq!(state.next_threshold, None);
        assert!(!state.is_beyond_next(Duration::days(365)));
    }

    #[test]
    fn reset_next_threshold_follows_table() {
        let mut state = EntityDelayState::new(&ThresholdTable::parse("0:01:00=WARN"));
        state.reached_threshold = Duration::minutes(1);
        state.reset_next_threshold(&ThresholdTable::parse("0:01:00=WARN;0:05:00=CRIT"));
        assert_eq!(state.next_threshold, Some(Duration::minutes(5)));
    }

    #[test]
    fn state_serializes_infinite_next_as_null() {
        let state = EntityDelayState::new(&ThresholdTable::default());
        let json = serde_json::to_value(&state).unwrap();
        assert!(json["next_threshold"].is_null());
        assert_eq!(json["reached_threshold"], "00:00:00");
        let back: EntityDelayState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
