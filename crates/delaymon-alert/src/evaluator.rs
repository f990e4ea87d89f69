//! Severity-change decision for a single age observation.
//!
//! Worsening is acted on as soon as the age passes the next bucket boundary.
//! Improvement must take the age below the current boundary shrunk by
//! `margin` percent before an UP is reported, so small fluctuations right
//! under a boundary stay silent.

use crate::error::AlertError;
use crate::state::EntityDelayState;
use crate::threshold::{Bucket, ThresholdTable};
use chrono::{DateTime, Duration, Utc};
use delaymon_common::types::{DelayAlert, Direction, EntityId};

pub const DEFAULT_MARGIN: i64 = 20;

/// Default window within which a return to the previous bucket counts as flapping.
pub fn default_flapping_threshold() -> Duration {
    Duration::seconds(10)
}

/// A bucket change decided by [`DelayEvaluator::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub direction: Direction,
    pub bucket: Bucket,
    pub age: Duration,
    pub flapping: bool,
    pub begin_flapping: bool,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn into_alert(self, rule_name: &str, entity_id: EntityId) -> DelayAlert {
        DelayAlert {
            rule_name: rule_name.to_string(),
            entity_id,
            direction: self.direction,
            label: self.bucket.label,
            age: self.age,
            threshold: self.bucket.boundary,
            flapping: self.flapping,
            begin_flapping: self.begin_flapping,
            timestamp: self.at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelayEvaluator {
    margin: u8,
    flapping_threshold: Duration,
}

impl DelayEvaluator {
    /// `margin` is a percentage in `[0, 100)`.
    pub fn new(margin: i64, flapping_threshold: Duration) -> Result<Self, AlertError> {
        if !(0..100).contains(&margin) {
            return Err(AlertError::InvalidMargin(margin));
        }
        Ok(Self {
            margin: margin as u8,
            flapping_threshold,
        })
    }

    pub fn margin(&self) -> u8 {
        self.margin
    }

    pub fn flapping_threshold(&self) -> Duration {
        self.flapping_threshold
    }

    /// `reached × (100 − margin) / 100`, at nanosecond precision when the
    /// boundary fits in an `i64` of nanoseconds.
    pub fn margin_floor(&self, reached: Duration) -> Duration {
        let keep = i128::from(100 - self.margin);
        // keep <= 100, so the scaled value always fits back in an i64.
        let scale = |units: i64| (i128::from(units) * keep / 100) as i64;
        if let Some(ns) = reached.num_nanoseconds() {
            return Duration::nanoseconds(scale(ns));
        }
        if let Some(us) = reached.num_microseconds() {
            return Duration::microseconds(scale(us));
        }
        Duration::milliseconds(scale(reached.num_milliseconds()))
    }

    /// Evaluates one age observation, updating `state` in place when a
    /// transition happens. Returns `None` when the bucket is unchanged.
    pub fn evaluate(
        &self,
        table: &ThresholdTable,
        age: Duration,
        state: &mut EntityDelayState,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let age = if age < Duration::zero() {
            tracing::warn!(age = %age, "Reference time is in the future, age clamped to zero");
            Duration::zero()
        } else {
            age
        };

        let reached = state.reached_threshold;
        let direction = if age < self.margin_floor(reached) {
            tracing::debug!(age = %age, reached = %reached, "Delay is better");
            Direction::Up
        } else if age < reached {
            tracing::debug!(age = %age, reached = %reached, "Delay just a little better");
            return None;
        } else if !state.is_beyond_next(age) {
            tracing::debug!(age = %age, reached = %reached, "No category change");
            return None;
        } else {
            tracing::debug!(age = %age, reached = %reached, "Delay is worse");
            Direction::Down
        };

        let bucket = table.bucket_for(age);
        let flapping = bucket.boundary == state.previous_threshold
            && now - state.previous_emission_time < self.flapping_threshold;
        let begin_flapping = flapping && !state.flapping;

        state.previous_threshold = reached;
        state.previous_emission_time = state.last_emission_time;
        state.reached_threshold = bucket.boundary;
        state.next_threshold = bucket.next_boundary;
        state.last_emission_time = now;
        state.flapping = flapping;
        state.begin_flapping = begin_flapping;

        Some(Transition {
            direction,
            bucket,
            age,
            flapping,
            begin_flapping,
            at: now,
        })
    }
}

impl Default for DelayEvaluator {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN as u8,
            flapping_threshold: default_flapping_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_must_be_a_percentage() {
        assert!(DelayEvaluator::new(0, Duration::zero()).is_ok());
        assert!(DelayEvaluator::new(99, Duration::zero()).is_ok());
        assert!(matches!(
            DelayEvaluator::new(100, Duration::zero()),
            Err(AlertError::InvalidMargin(100))
        ));
        assert!(matches!(
            DelayEvaluator::new(-1, Duration::zero()),
            Err(AlertError::InvalidMargin(-1))
        ));
    }

    #[test]
    fn margin_floor_shrinks_boundary() {
        let evaluator = DelayEvaluator::new(20, Duration::zero()).unwrap();
        assert_eq!(evaluator.margin_floor(Duration::seconds(60)), Duration::seconds(48));
        assert_eq!(evaluator.margin_floor(Duration::zero()), Duration::zero());

        let no_margin = DelayEvaluator::new(0, Duration::zero()).unwrap();
        assert_eq!(no_margin.margin_floor(Duration::seconds(60)), Duration::seconds(60));
    }

    #[test]
    fn margin_floor_keeps_sub_millisecond_precision() {
        let evaluator = DelayEvaluator::new(20, Duration::zero()).unwrap();
        assert_eq!(
            evaluator.margin_floor(Duration::microseconds(500)),
            Duration::microseconds(400)
        );
        assert_eq!(
            evaluator.margin_floor(Duration::days(365 * 400)),
            Duration::days(365 * 320)
        );
    }

    #[test]
    fn fractional_threshold_improvement_emits_up() {
        let table = ThresholdTable::parse("0:00:00.0005=WARN");
        let evaluator = DelayEvaluator::new(0, Duration::zero()).unwrap();
        let mut state = EntityDelayState::new(&table);
        let now = Utc::now();

        let down = evaluator
            .evaluate(&table, Duration::microseconds(600), &mut state, now)
            .unwrap();
        assert_eq!(down.direction, Direction::Down);
        assert_eq!(state.reached_threshold, Duration::microseconds(500));

        let up = evaluator
            .evaluate(&table, Duration::microseconds(400), &mut state, now)
            .unwrap();
        assert_eq!(up.direction, Direction::Up);
        assert_eq!(up.bucket.boundary, Duration::zero());
    }

    #[test]
    fn negative_age_is_clamped() {
        let table = ThresholdTable::parse("0:01:00=WARN");
        let evaluator = DelayEvaluator::default();
        let mut state = EntityDelayState::new(&table);
        let before = state.clone();

        assert!(evaluator
            .evaluate(&table, Duration::seconds(-30), &mut state, Utc::now())
            .is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn transition_carries_bucket_into_alert() {
        let table = ThresholdTable::parse("0:01:00=WARN;0:10:00=CRIT");
        let evaluator = DelayEvaluator::default();
        let mut state = EntityDelayState::new(&table);
        let now = Utc::now();

        let alert = evaluator
            .evaluate(&table, Duration::minutes(11), &mut state, now)
            .unwrap()
            .into_alert("modification-delay", 42);

        assert_eq!(alert.direction, Direction::Down);
        assert_eq!(alert.label, "CRIT");
        assert_eq!(alert.threshold, Duration::minutes(10));
        assert_eq!(alert.entity_id, 42);
        assert_eq!(alert.timestamp, now);
        assert_eq!(state.next_threshold, None);
    }
}
