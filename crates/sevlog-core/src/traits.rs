//! Core traits for the event log
//!
//! These traits are the seams between the writer/reader layer and the
//! storage backends. Implementations must be safe to share across threads.

use chrono::{DateTime, Utc};

use crate::cursor::{MessageCursor, ScanOrder};
use crate::error::LogError;
use crate::filter::MessageFilter;
use crate::types::{LevelId, Message, MessageId, SeverityLevel};

/// The table of named severity levels
///
/// Registration must be serialized: of two concurrent `register` calls for
/// the same name, exactly one succeeds.
pub trait SeverityRegistry: Send + Sync {
    /// Look up a level by exact, case-sensitive name
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownSeverity`] if no level has this name.
    fn resolve(&self, name: &str) -> Result<SeverityLevel, LogError>;

    /// Register a new level under the next unused identifier
    ///
    /// # Errors
    ///
    /// Returns [`LogError::DuplicateSeverity`] if the name is taken and
    /// [`LogError::InvalidSeverityName`] if it is blank.
    fn register(&self, name: &str) -> Result<SeverityLevel, LogError>;

    /// All registered levels, ordered by identifier ascending
    fn list(&self) -> Result<Vec<SeverityLevel>, LogError>;

    /// Look up a level by identifier
    fn get(&self, id: LevelId) -> Result<Option<SeverityLevel>, LogError>;

    /// Make sure every name in `names` is registered, in order
    ///
    /// Existing levels keep their identifiers. Losing a registration race to
    /// another provisioner is not an error.
    fn provision(&self, names: &[&str]) -> Result<Vec<SeverityLevel>, LogError> {
        let mut levels = Vec::with_capacity(names.len());
        for name in names {
            let level = match self.resolve(name) {
                Ok(level) => level,
                Err(LogError::UnknownSeverity(_)) => match self.register(name) {
                    Ok(level) => level,
                    Err(LogError::DuplicateSeverity(_)) => self.resolve(name)?,
                    Err(e) => return Err(e),
                },
                Err(e) => return Err(e),
            };
            levels.push(level);
        }
        Ok(levels)
    }
}

/// Append-only, queryable message storage
///
/// `append` is the only mutating operation. Reads observe a consistent
/// snapshot taken when the cursor is created and never block writers.
pub trait EventStore: Send + Sync {
    /// Persist one message and return its newly allocated identifier
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownSeverity`] if `level` is not registered and
    /// [`LogError::StorageUnavailable`] if the write cannot be made durable.
    fn append(
        &self,
        level: LevelId,
        payload: &str,
        source: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId, LogError>;

    /// Fetch a single message by identifier
    fn get(&self, id: MessageId) -> Result<Option<Message>, LogError>;

    /// Lazily scan matching messages in the given timeline order
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidFilter`] for an inverted time range.
    fn scan(&self, filter: &MessageFilter, order: ScanOrder) -> Result<MessageCursor, LogError>;

    /// Number of matching messages (capped by the filter's limit)
    fn count(&self, filter: &MessageFilter) -> Result<u64, LogError>;

    /// Matching messages ordered by timestamp, then identifier
    fn query(&self, filter: &MessageFilter) -> Result<MessageCursor, LogError> {
        self.scan(filter, ScanOrder::Ascending)
    }
}

/// Administrative removal of old messages
///
/// Kept apart from [`EventStore`] so that producers and consumers holding a
/// store cannot delete history. Identifiers are never reused after a purge.
pub trait Purge: Send + Sync {
    /// Remove every message with a timestamp strictly before `cutoff`
    ///
    /// Returns the number of messages removed.
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LogError>;
}
