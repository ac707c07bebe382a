//! # Sevlog Core
//!
//! Core types, traits, and errors for the severity-leveled event log.
//!
//! This crate holds the vocabulary shared by every backend and by the
//! writer/reader layer, so that the same logic runs against the in-memory
//! store (tests, simulation) and the durable redb store (production).
//!
//! ## Key Traits
//!
//! - [`SeverityRegistry`]: the table of named severity levels
//! - [`EventStore`]: append-only, queryable message storage
//! - [`Purge`]: administrative removal of old messages (retention)
//! - [`Clock`]: time abstraction for testability
//!
//! ## Key Types
//!
//! - [`SeverityLevel`] / [`LevelId`]: a registered severity
//! - [`Message`] / [`MessageId`]: one immutable log record
//! - [`MessageFilter`]: severity set, time range, source match, limit
//! - [`MessageCursor`]: lazily paged query results

pub mod clock;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cursor::{MessageCursor, PageSource, ScanOrder, DEFAULT_PAGE_SIZE};
pub use error::LogError;
pub use filter::{MessageFilter, SourceMatch};
pub use traits::{EventStore, Purge, SeverityRegistry};
pub use types::{
    DEFAULT_SEVERITIES, LevelId, Message, MessageId, SeverityLevel, TimelineKey, ceil_micros,
    truncate_to_micros, validate_level_name,
};
