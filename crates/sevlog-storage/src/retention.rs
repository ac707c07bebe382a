//! Retention policy for stored messages
//!
//! Retention is an administrative concern: it runs against a [`Purge`]
//! handle, never through the producer/consumer contracts. The policy is
//! disabled unless a maximum age is configured.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sevlog_core::{LogError, Purge};

/// Decides which messages are old enough to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    /// Messages older than this are purged (`None` keeps everything)
    max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// A policy that never purges
    pub fn keep_forever() -> Self {
        Self::default()
    }

    /// A policy that purges messages older than `max_age`
    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }

    /// Get the configured maximum age
    pub fn max_age_limit(&self) -> Option<Duration> {
        self.max_age
    }

    /// Whether this policy ever removes anything
    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some()
    }

    /// Oldest timestamp that survives when the policy runs at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age
            .map(|age| now.checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    /// Run the policy against a store
    pub fn apply(&self, target: &dyn Purge, now: DateTime<Utc>) -> Result<RetentionReport, LogError> {
        let Some(cutoff) = self.cutoff(now) else {
            return Ok(RetentionReport::new(0, None, now));
        };

        let purged = target.purge_before(cutoff)?;
        info!(purged = purged, cutoff = %cutoff, "Applied retention policy");
        Ok(RetentionReport::new(purged, Some(cutoff), now))
    }
}

/// Builder for RetentionPolicy
#[derive(Debug, Default)]
pub struct RetentionPolicyBuilder {
    max_age: Option<Duration>,
}

impl RetentionPolicyBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep messages for this many days
    pub fn max_age_days(mut self, days: u64) -> Self {
        let days = i64::try_from(days).unwrap_or(i64::MAX);
        self.max_age = Some(Duration::try_days(days).unwrap_or(Duration::MAX));
        self
    }

    /// Keep messages for an arbitrary duration
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Build the RetentionPolicy
    pub fn build(self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: self.max_age,
        }
    }
}

/// Result of a retention run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionReport {
    /// Number of messages removed
    pub purged: u64,
    /// Cutoff used (`None` when the policy is disabled)
    pub cutoff: Option<DateTime<Utc>>,
    /// When the policy ran
    pub applied_at: DateTime<Utc>,
}

impl RetentionReport {
    /// Create a new retention report
    pub fn new(purged: u64, cutoff: Option<DateTime<Utc>>, applied_at: DateTime<Utc>) -> Self {
        Self {
            purged,
            cutoff,
            applied_at,
        }
    }
}
