use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::timespan;

/// Stable identifier of a monitored entity (machine, line, global queue).
pub type EntityId = i64;

/// Direction of a severity change.
///
/// # Examples
///
/// ```
/// use delaymon_common::types::Direction;
///
/// assert_eq!(Direction::Down.to_string(), "DOWN");
/// assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"UP\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// The age improved into a lower bucket.
    Up,
    /// The age worsened into a higher bucket.
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// A severity-change alert for one entity, emitted by a delay rule.
///
/// This is the wire contract handed to alert sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayAlert {
    /// Name of the rule that produced the alert (e.g. `"modification-delay"`)
    pub rule_name: String,
    pub entity_id: EntityId,
    pub direction: Direction,
    /// Label of the bucket now reached (e.g. `"WARNING"`, or `"OK"`)
    pub label: String,
    /// Observed age at emission time
    #[serde(with = "timespan::serde_timespan")]
    pub age: Duration,
    /// Lower bound of the reached bucket
    #[serde(with = "timespan::serde_timespan")]
    pub threshold: Duration,
    pub flapping: bool,
    /// True only on the alert where flapping starts
    pub begin_flapping: bool,
    pub timestamp: DateTime<Utc>,
}

impl DelayAlert {
    /// One-line human-readable description of the alert.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use delaymon_common::types::{DelayAlert, Direction};
    ///
    /// let alert = DelayAlert {
    ///     rule_name: "modification-delay".into(),
    ///     entity_id: 7,
    ///     direction: Direction::Down,
    ///     label: "WARNING".into(),
    ///     age: Duration::seconds(75),
    ///     threshold: Duration::seconds(60),
    ///     flapping: false,
    ///     begin_flapping: false,
    ///     timestamp: Utc::now(),
    /// };
    /// assert_eq!(
    ///     alert.summary(),
    ///     "modification-delay: entity 7 DOWN to WARNING (age 00:01:15, threshold 00:01:00)"
    /// );
    /// ```
    pub fn summary(&self) -> String {
        let flapping = if self.begin_flapping {
            " [flapping started]"
        } else if self.flapping {
            " [flapping]"
        } else {
            ""
        };
        format!(
            "{}: entity {} {} to {} (age {}, threshold {}){}",
            self.rule_name,
            self.entity_id,
            self.direction,
            self.label,
            timespan::format(self.age),
            timespan::format(self.threshold),
            flapping,
        )
    }
}
