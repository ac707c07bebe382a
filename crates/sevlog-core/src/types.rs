//! Identifiers, severity levels, and messages

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// The severity levels provisioned by default, in rank order
pub const DEFAULT_SEVERITIES: [&str; 8] = [
    "TRACE", "DEBUG", "STATUS", "INFO", "EVENT", "WARNING", "ERROR", "CRITICAL",
];

/// Stable identifier of a registered severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelId(pub u64);

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a stored message
///
/// Allocated by the store, strictly increasing in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a message on the timeline: `(timestamp micros, id)`
///
/// Query results are ordered by this key, so ties on timestamp fall back to
/// insertion order.
pub type TimelineKey = (i64, u64);

/// Drop the sub-microsecond part of an instant
///
/// Stores keep microsecond precision, so every backend normalizes through
/// this before persisting a timestamp.
pub fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(instant.timestamp_micros()).unwrap_or(instant)
}

/// Smallest whole microsecond not earlier than `instant`
///
/// A stored timestamp `t` (whole microseconds) satisfies `t >= bound`
/// exactly when `t >= ceil_micros(bound)`, and `t < bound` exactly when
/// `t < ceil_micros(bound)`.
pub fn ceil_micros(instant: DateTime<Utc>) -> i64 {
    let micros = instant.timestamp_micros();
    if instant.timestamp_subsec_nanos() % 1_000 == 0 {
        micros
    } else {
        micros.saturating_add(1)
    }
}

/// A registered severity level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeverityLevel {
    /// Identifier, never reused or renumbered
    pub id: LevelId,
    /// Unique, case-sensitive name
    pub name: String,
}

impl SeverityLevel {
    /// Create a new severity level
    pub fn new(id: LevelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Reject names that cannot be registered
///
/// Names are matched exactly, so the only unusable ones are empty or
/// consist solely of whitespace.
pub fn validate_level_name(name: &str) -> Result<(), LogError> {
    if name.trim().is_empty() {
        return Err(LogError::InvalidSeverityName(name.to_string()));
    }
    Ok(())
}

/// One immutable log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier
    pub id: MessageId,
    /// Severity of the message
    pub level: LevelId,
    /// Creation timestamp (microsecond precision)
    pub timestamp: DateTime<Utc>,
    /// Free-form text
    pub payload: String,
    /// Component that emitted the message
    pub source: Option<String>,
}

impl Message {
    /// Position of this message on the timeline
    pub fn timeline_key(&self) -> TimelineKey {
        (self.timestamp.timestamp_micros(), self.id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_micro_rounding() {
        let whole = DateTime::from_timestamp_micros(1_600_000_000_000_000).unwrap();
        let between = whole + Duration::nanoseconds(500);

        assert_eq!(ceil_micros(whole), whole.timestamp_micros());
        assert_eq!(ceil_micros(between), whole.timestamp_micros() + 1);
        assert_eq!(truncate_to_micros(between), whole);
        assert_eq!(truncate_to_micros(whole), whole);

        let before_epoch = DateTime::from_timestamp_micros(-10).unwrap() + Duration::nanoseconds(1);
        assert_eq!(ceil_micros(before_epoch), -9);
        assert_eq!(truncate_to_micros(before_epoch).timestamp_micros(), -10);
    }

    #[test]
    fn test_validate_level_name() {
        assert!(validate_level_name("INFO").is_ok());
        assert!(validate_level_name("info").is_ok());
        assert!(matches!(
            validate_level_name(""),
            Err(LogError::InvalidSeverityName(_))
        ));
        assert!(validate_level_name("  \t").is_err());
    }

    #[test]
    fn test_timeline_key_orders_ties_by_id() {
        let ts = DateTime::from_timestamp_micros(1_600_000_000_000_000).unwrap();
        let first = Message {
            id: MessageId(1),
            level: LevelId(1),
            timestamp: ts,
            payload: "a".into(),
            source: None,
        };
        let second = Message {
            id: MessageId(2),
            ..first.clone()
        };
        assert!(first.timeline_key() < second.timeline_key());
    }

    #[test]
    fn test_default_severities_are_valid_and_unique() {
        let mut names: Vec<_> = DEFAULT_SEVERITIES.to_vec();
        for name in &names {
            validate_level_name(name).unwrap();
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_SEVERITIES.len());
    }
}
