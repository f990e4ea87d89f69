use chrono::Duration;
use delaymon_common::timespan;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Label of the implicit bucket below the first configured threshold.
pub const OK_LABEL: &str = "OK";

/// The bucket an age falls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Lower bound of the bucket (`Duration::zero()` for the implicit OK bucket)
    pub boundary: Duration,
    pub label: String,
    /// Lower bound of the next bucket up, `None` when there is none
    pub next_boundary: Option<Duration>,
}

/// Ordered mapping from a minimum age to a severity label.
///
/// Built from `duration=label` entries separated by `;`. Entries may come in
/// any order; lookups always walk them by ascending minimum age.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use delaymon_alert::threshold::ThresholdTable;
///
/// let table = ThresholdTable::parse("0:01:00=ERROR;0:00:30=WARNING");
/// let bucket = table.bucket_for(Duration::seconds(45));
/// assert_eq!(bucket.label, "WARNING");
/// assert_eq!(bucket.boundary, Duration::seconds(30));
/// assert_eq!(bucket.next_boundary, Some(Duration::seconds(60)));
/// assert_eq!(table.to_string(), "00:00:30=WARNING;00:01:00=ERROR");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdTable {
    entries: BTreeMap<Duration, String>,
}

impl ThresholdTable {
    /// Parses a threshold definition. Malformed entries are dropped with a warning;
    /// this never fails.
    pub fn parse(definition: &str) -> Self {
        let mut entries = BTreeMap::new();

        for piece in definition.split(';') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }

            let Some((literal, label)) = piece.split_once('=') else {
                tracing::warn!(entry = piece, "Invalid threshold entry, expected duration=label");
                continue;
            };

            match timespan::parse(literal) {
                Ok(min_age) if min_age < Duration::zero() => {
                    tracing::warn!(entry = piece, "Negative threshold dropped");
                }
                Ok(min_age) => {
                    entries.insert(min_age, label.trim().to_string());
                }
                Err(e) => {
                    tracing::warn!(entry = piece, error = %e, "Invalid threshold duration");
                }
            }
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries by ascending minimum age.
    pub fn iter(&self) -> impl Iterator<Item = (Duration, &str)> {
        self.entries.iter().map(|(d, l)| (*d, l.as_str()))
    }

    /// Resolves the bucket for `age`: the entry with the greatest minimum age
    /// not above `age`, or the implicit OK bucket when `age` is below them all.
    pub fn bucket_for(&self, age: Duration) -> Bucket {
        let next_boundary = self.next_above(age);
        match self.entries.range(..=age).next_back() {
            Some((boundary, label)) => Bucket {
                boundary: *boundary,
                label: label.clone(),
                next_boundary,
            },
            None => Bucket {
                boundary: Duration::zero(),
                label: OK_LABEL.to_string(),
                next_boundary,
            },
        }
    }

    /// Smallest minimum age strictly greater than `threshold`.
    pub fn next_above(&self, threshold: Duration) -> Option<Duration> {
        use std::ops::Bound::{Excluded, Unbounded};
        self.entries
            .range((Excluded(threshold), Unbounded))
            .next()
            .map(|(d, _)| *d)
    }
}

impl FromStr for ThresholdTable {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl std::fmt::Display for ThresholdTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (min_age, label)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}={}", timespan::format(*min_age), label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sorts_entries() {
        let table = ThresholdTable::parse("0:10:00=CRITICAL;0:00:30=WARNING;0:01:00=ERROR");
        let labels: Vec<&str> = table.iter().map(|(_, l)| l).collect();
        assert_eq!(labels, ["WARNING", "ERROR", "CRITICAL"]);
    }

    #[test]
    fn parse_drops_bad_entries() {
        let table = ThresholdTable::parse("0:00:30=WARNING;garbage;x:y=ERROR;-0:00:10=NEG;;0:01:00=ERROR;");
        assert_eq!(table.len(), 2);
        assert_eq!(table.to_string(), "00:00:30=WARNING;00:01:00=ERROR");
    }

    #[test]
    fn parse_splits_on_first_equals() {
        let table = ThresholdTable::parse("0:00:30=a=b");
        assert_eq!(table.iter().next(), Some((Duration::seconds(30), "a=b")));
    }

    #[test]
    fn duplicate_keeps_last_label() {
        let table = ThresholdTable::parse("0:00:30=WARNING;0:00:30=NOTICE");
        assert_eq!(table.len(), 1);
        assert_eq!(table.bucket_for(Duration::seconds(31)).label, "NOTICE");
    }

    #[test]
    fn bucket_below_first_entry_is_ok() {
        let table = ThresholdTable::parse("0:00:30=WARNING;0:01:00=ERROR");
        let bucket = table.bucket_for(Duration::seconds(10));
        assert_eq!(
            bucket,
            Bucket {
                boundary: Duration::zero(),
                label: OK_LABEL.into(),
                next_boundary: Some(Duration::seconds(30)),
            }
        );
    }

    #[test]
    fn bucket_on_exact_boundary() {
        let table = ThresholdTable::parse("0:00:30=WARNING;0:01:00=ERROR");
        let bucket = table.bucket_for(Duration::seconds(60));
        assert_eq!(bucket.label, "ERROR");
        assert_eq!(bucket.boundary, Duration::seconds(60));
        assert_eq!(bucket.next_boundary, None);
    }

    #[test]
    fn empty_table_always_ok() {
        let table = ThresholdTable::parse("");
        assert!(table.is_empty());
        let bucket = table.bucket_for(Duration::days(3));
        assert_eq!(bucket.label, OK_LABEL);
        assert_eq!(bucket.next_boundary, None);
    }

    #[test]
    fn next_above_skips_equal() {
        let table = ThresholdTable::parse("0:00:30=WARNING;0:01:00=ERROR");
        assert_eq!(table.next_above(Duration::zero()), Some(Duration::seconds(30)));
        assert_eq!(table.next_above(Duration::seconds(30)), Some(Duration::seconds(60)));
        assert_eq!(table.next_above(Duration::seconds(60)), None);
    }
}
