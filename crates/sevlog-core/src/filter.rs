//! Message filters
//!
//! A [`MessageFilter`] selects messages by severity set, half-open time
//! range `[from, to)`, source tag, and a maximum result count. Backends turn
//! the time range (plus a resume position) into bounds over the
//! [`TimelineKey`] index via [`MessageFilter::timeline_bounds`].

use std::collections::BTreeSet;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::ScanOrder;
use crate::error::LogError;
use crate::types::{LevelId, Message, TimelineKey, ceil_micros};

/// How a filter matches the source tag of a message
///
/// Messages without a source tag never match a source filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMatch {
    /// Source tag equals the given string
    Exact(String),
    /// Source tag starts with the given string
    Prefix(String),
}

impl SourceMatch {
    /// Check a (possibly absent) source tag against this matcher
    pub fn matches(&self, source: Option<&str>) -> bool {
        match (self, source) {
            (_, None) => false,
            (SourceMatch::Exact(want), Some(s)) => s == want,
            (SourceMatch::Prefix(prefix), Some(s)) => s.starts_with(prefix.as_str()),
        }
    }
}

/// Store-level query filter
///
/// The default filter matches every message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Severities to match (any of); `None` matches all, an empty set matches none
    pub severities: Option<BTreeSet<LevelId>>,
    /// Inclusive lower bound on the timestamp
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the timestamp
    pub to: Option<DateTime<Utc>>,
    /// Source tag matcher
    pub source: Option<SourceMatch>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl MessageFilter {
    /// A filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a severity to the match set
    pub fn with_severity(mut self, level: LevelId) -> Self {
        self.severities.get_or_insert_with(BTreeSet::new).insert(level);
        self
    }

    /// Replace the match set
    pub fn with_severities(mut self, levels: impl IntoIterator<Item = LevelId>) -> Self {
        self.severities = Some(levels.into_iter().collect());
        self
    }

    /// Only messages at or after `from`
    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Only messages strictly before `to`
    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Only messages whose source equals `source`
    pub fn source_exact(mut self, source: impl Into<String>) -> Self {
        self.source = Some(SourceMatch::Exact(source.into()));
        self
    }

    /// Only messages whose source starts with `prefix`
    pub fn source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source = Some(SourceMatch::Prefix(prefix.into()));
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject malformed filters before any storage access
    pub fn validate(&self) -> Result<(), LogError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(LogError::invalid_filter(format!(
                "time range is inverted: from {} is after to {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// True when the filter can never match anything
    pub fn is_empty_selection(&self) -> bool {
        self.limit == Some(0)
            || self.severities.as_ref().is_some_and(BTreeSet::is_empty)
            || matches!((self.from, self.to), (Some(from), Some(to)) if from >= to)
    }

    /// Check the non-temporal parts of the filter
    ///
    /// The time range is applied through [`Self::timeline_bounds`], so this
    /// only looks at the severity and the source tag.
    pub fn matches_entry(&self, level: LevelId, source: Option<&str>) -> bool {
        if let Some(severities) = &self.severities
            && !severities.contains(&level)
        {
            return false;
        }
        match &self.source {
            Some(matcher) => matcher.matches(source),
            None => true,
        }
    }

    /// Check a full message, including its timestamp
    pub fn matches(&self, message: &Message) -> bool {
        if self.from.is_some_and(|from| message.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| message.timestamp >= to) {
            return false;
        }
        self.matches_entry(message.level, message.source.as_deref())
    }

    /// Bounds over the timeline index for one page of a scan
    ///
    /// `after` is the last key already returned in scan order; the next page
    /// starts strictly beyond it. Returns `None` when the bounds are empty,
    /// so callers never hand an inverted range to a map.
    pub fn timeline_bounds(
        &self,
        after: Option<TimelineKey>,
        order: ScanOrder,
    ) -> Option<(Bound<TimelineKey>, Bound<TimelineKey>)> {
        // Identifiers start at 1, so id 0 sorts before every message at that instant.
        let mut lower = match self.from {
            Some(from) => Bound::Included((ceil_micros(from), 0)),
            None => Bound::Unbounded,
        };
        let mut upper = match self.to {
            Some(to) => Bound::Excluded((ceil_micros(to), 0)),
            None => Bound::Unbounded,
        };

        if let Some(key) = after {
            match order {
                ScanOrder::Ascending => lower = Bound::Excluded(key),
                ScanOrder::Descending => upper = Bound::Excluded(key),
            }
        }

        let non_empty = match (&lower, &upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Included(lo), Bound::Included(hi)) => lo <= hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo < hi,
        };

        non_empty.then_some((lower, upper))
    }
}
