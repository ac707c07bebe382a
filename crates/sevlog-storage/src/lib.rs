//! # Sevlog Storage
//!
//! Storage backends for the severity-leveled event log.
//!
//! ## Features
//!
//! - **InMemorySeverityRegistry / InMemoryEventStore**: in-memory backends for testing/simulation
//! - **RedbSeverityRegistry / RedbEventStore**: durable backends sharing one redb database
//! - **RetentionPolicy**: age-based purging of old messages (administrative)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sevlog_core::{EventStore, MessageFilter, SeverityRegistry};
//! use sevlog_storage::{InMemoryEventStore, InMemorySeverityRegistry};
//!
//! let registry = Arc::new(InMemorySeverityRegistry::new());
//! let info = registry.register("INFO").unwrap();
//! let store = InMemoryEventStore::new(registry.clone());
//!
//! store.append(info.id, "pipeline started", Some("ingest"), chrono::Utc::now()).unwrap();
//! assert_eq!(store.count(&MessageFilter::all()).unwrap(), 1);
//! ```

pub mod memory;
pub mod retention;
pub mod structured;

// Re-exports
pub use memory::{InMemoryEventStore, InMemorySeverityRegistry};
pub use retention::{RetentionPolicy, RetentionPolicyBuilder, RetentionReport};
pub use structured::{RedbEventStore, RedbSeverityRegistry, RedbStorage, RedbStorageConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use sevlog_core::{EventStore, Purge, SeverityRegistry};

    /// Test that the storage traits are object-safe
    fn _assert_object_safe(_: &dyn EventStore, _: &dyn SeverityRegistry, _: &dyn Purge) {}

    #[test]
    fn test_backends_share_trait_objects() {
        let registry: std::sync::Arc<dyn SeverityRegistry> =
            std::sync::Arc::new(InMemorySeverityRegistry::new());
        let store = InMemoryEventStore::new(registry.clone());
        _assert_object_safe(&store, registry.as_ref(), &store);
    }
}
