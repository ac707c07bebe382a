//! Durable storage using redb
//!
//! This module mirrors the relational schema of the log:
//! - Severity level table (plus a name uniqueness index)
//! - Message table keyed by identifier
//! - Timeline index ordering messages by `(timestamp, id)`
//! - Sequence counters for identifier allocation
//!
//! Every append and registration is one write transaction; every cursor
//! holds one read transaction, so readers see a stable snapshot and never
//! block writers.

mod message_table;
mod severity_table;
mod tables;

pub use message_table::RedbEventStore;
pub use severity_table::RedbSeverityRegistry;
pub use tables::{RedbStorage, RedbStorageConfig};
