//! Consumer side of the event log
//!
//! Queries name severities by string; the reader resolves them against the
//! registry and hands a [`MessageFilter`] to the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sevlog_core::{
    EventStore, LogError, Message, MessageCursor, MessageFilter, MessageId, ScanOrder,
    SeverityLevel, SeverityRegistry, SourceMatch,
};

/// A query in terms of severity names
///
/// The default query matches every message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    /// Severity names to match (any of); `None` matches all
    pub severities: Option<BTreeSet<String>>,
    /// Inclusive lower bound on the timestamp
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the timestamp
    pub to: Option<DateTime<Utc>>,
    /// Source tag matcher
    pub source: Option<SourceMatch>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl LogQuery {
    /// A query that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a severity name to the match set
    pub fn with_severity(mut self, name: impl Into<String>) -> Self {
        self.severities
            .get_or_insert_with(BTreeSet::new)
            .insert(name.into());
        self
    }

    /// Replace the match set
    pub fn with_severities<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.severities = Some(names.into_iter().map(Into::into).collect());
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
}

/// Reads messages back out of the store
#[derive(Clone)]
pub struct LogReader {
    registry: Arc<dyn SeverityRegistry>,
    store: Arc<dyn EventStore>,
}

impl LogReader {
    /// A reader over a registry and the store it resolves levels for
    pub fn new(registry: Arc<dyn SeverityRegistry>, store: Arc<dyn EventStore>) -> Self {
        Self { registry, store }
    }

    /// Matching messages ordered by timestamp, then identifier
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidFilter`] for an inverted time range and
    /// [`LogError::UnknownSeverity`] for an unregistered severity name.
    #[instrument(skip(self))]
    pub fn find(&self, query: &LogQuery) -> Result<MessageCursor, LogError> {
        let filter = self.resolve(query)?;
        self.store.query(&filter)
    }

    /// The `n` most recent matching messages, newest first
    ///
    /// A limit on the query caps the result further.
    #[instrument(skip(self))]
    pub fn tail(&self, n: usize, query: &LogQuery) -> Result<Vec<Message>, LogError> {
        let mut filter = self.resolve(query)?;
        filter.limit = Some(filter.limit.map_or(n, |limit| limit.min(n)));
        self.store
            .scan(&filter, ScanOrder::Descending)?
            .collect_messages()
    }

    /// Number of matching messages, capped by the query's limit
    #[instrument(skip(self))]
    pub fn count(&self, query: &LogQuery) -> Result<u64, LogError> {
        let filter = self.resolve(query)?;
        self.store.count(&filter)
    }

    /// Fetch a single message by identifier
    pub fn get(&self, id: MessageId) -> Result<Option<Message>, LogError> {
        self.store.get(id)
    }

    /// Every registered severity level, by identifier
    pub fn levels(&self) -> Result<Vec<SeverityLevel>, LogError> {
        self.registry.list()
    }

    /// Name of the level with this identifier, if registered
    pub fn level_name(&self, message: &Message) -> Result<Option<String>, LogError> {
        Ok(self.registry.get(message.level)?.map(|level| level.name))
    }

    /// Turn a name-based query into a store filter
    ///
    /// The time range is checked before any name lookup.
    fn resolve(&self, query: &LogQuery) -> Result<MessageFilter, LogError> {
        let mut filter = MessageFilter {
            severities: None,
            from: query.from,
            to: query.to,
            source: query.source.clone(),
            limit: query.limit,
        };
        filter.validate()?;

        if let Some(names) = &query.severities {
            let ids = names
                .iter()
                .map(|name| self.registry.resolve(name).map(|level| level.id))
                .collect::<Result<BTreeSet<_>, _>>()?;
            filter.severities = Some(ids);
        }
        Ok(filter)
    }
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReader").finish_non_exhaustive()
    }
}
