//! The assembled event log: backends, writer, reader, and retention

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use sevlog_core::{
    Clock, EventStore, LogError, Purge, SeverityLevel, SeverityRegistry, SystemClock,
};
use sevlog_storage::{
    InMemoryEventStore, InMemorySeverityRegistry, RedbEventStore, RedbSeverityRegistry,
    RedbStorage, RetentionPolicy, RetentionReport,
};

use crate::config::{EngineConfig, StorageBackend};
use crate::reader::LogReader;
use crate::writer::LogWriter;

/// An open event log
///
/// Writers and readers handed out by one `EventLog` share the same
/// registry and store.
pub struct EventLog {
    registry: Arc<dyn SeverityRegistry>,
    store: Arc<dyn EventStore>,
    purge: Arc<dyn Purge>,
    clock: Arc<dyn Clock>,
    retention: RetentionPolicy,
}

impl EventLog {
    /// Open the configured backend and provision the seed levels
    pub fn open(config: &EngineConfig) -> Result<Self, LogError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit clock for writers and retention
    #[instrument(skip(config, clock), fields(backend = ?config.storage.backend))]
    pub fn open_with_clock(config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, LogError> {
        let (registry, store, purge): (Arc<dyn SeverityRegistry>, Arc<dyn EventStore>, Arc<dyn Purge>) =
            match config.storage.backend {
                StorageBackend::Memory => {
                    let registry: Arc<dyn SeverityRegistry> = Arc::new(InMemorySeverityRegistry::new());
                    let store = Arc::new(InMemoryEventStore::new(registry.clone()));
                    (registry, store.clone() as Arc<dyn EventStore>, store as Arc<dyn Purge>)
                }
                StorageBackend::Redb => {
                    let storage = Arc::new(RedbStorage::open(config.storage.redb_config())?);
                    let registry: Arc<dyn SeverityRegistry> =
                        Arc::new(RedbSeverityRegistry::new(storage.clone()));
                    let store = Arc::new(RedbEventStore::new(storage));
                    (registry, store.clone() as Arc<dyn EventStore>, store as Arc<dyn Purge>)
                }
            };

        let seed: Vec<&str> = config.severity.seed.iter().map(String::as_str).collect();
        let levels = registry.provision(&seed)?;
        info!(levels = levels.len(), "Event log open");

        Ok(Self {
            registry,
            store,
            purge,
            clock,
            retention: config.retention_policy(),
        })
    }

    /// An in-memory log with the default levels
    pub fn in_memory() -> Result<Self, LogError> {
        Self::open(&EngineConfig::testing())
    }

    /// A producer handle
    pub fn writer(&self) -> LogWriter {
        LogWriter::with_clock(self.registry.clone(), self.store.clone(), self.clock.clone())
    }

    /// A consumer handle
    pub fn reader(&self) -> LogReader {
        LogReader::new(self.registry.clone(), self.store.clone())
    }

    pub fn registry(&self) -> &Arc<dyn SeverityRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Register an additional severity level
    pub fn register_level(&self, name: &str) -> Result<SeverityLevel, LogError> {
        self.registry.register(name)
    }

    /// Remove every message strictly older than `cutoff`
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LogError> {
        self.purge.purge_before(cutoff)
    }

    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Run the configured retention policy now
    pub fn apply_retention(&self) -> Result<RetentionReport, LogError> {
        self.apply_policy(&self.retention)
    }

    /// Run an arbitrary retention policy now
    pub fn apply_policy(&self, policy: &RetentionPolicy) -> Result<RetentionReport, LogError> {
        policy.apply(self.purge.as_ref(), self.clock.now_utc())
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sevlog_core::{DEFAULT_SEVERITIES, ManualClock, MessageId};

    use crate::reader::LogQuery;

    #[test]
    fn test_in_memory_provisions_defaults() {
        let log = EventLog::in_memory().unwrap();
        let names: Vec<_> = log.reader().levels().unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, DEFAULT_SEVERITIES);
    }

    #[test]
    fn test_writer_and_reader_share_store() {
        let log = EventLog::in_memory().unwrap();
        let id = log.writer().write("INFO", "hello", None).unwrap();
        assert_eq!(id, MessageId(1));
        assert_eq!(log.reader().count(&LogQuery::all()).unwrap(), 1);
    }

    #[test]
    fn test_register_level() {
        let log = EventLog::in_memory().unwrap();
        let notice = log.register_level("NOTICE").unwrap();
        assert_eq!(notice.id.0, DEFAULT_SEVERITIES.len() as u64 + 1);
        assert!(matches!(
            log.register_level("NOTICE"),
            Err(LogError::DuplicateSeverity(_))
        ));
        log.writer().write("NOTICE", "now usable", None).unwrap();
    }

    #[test]
    fn test_retention_uses_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut config = EngineConfig::testing();
        config.retention.max_age_days = Some(7);
        let log = EventLog::open_with_clock(&config, clock.clone()).unwrap();

        let writer = log.writer();
        writer.write("INFO", "old", None).unwrap();
        clock.advance(Duration::days(10));
        writer.write("INFO", "fresh", None).unwrap();

        let report = log.apply_retention().unwrap();
        assert_eq!(report.purged, 1);
        assert_eq!(report.cutoff, Some(start + Duration::days(3)));

        let remaining = log.reader().find(&LogQuery::all()).unwrap().collect_messages().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, "fresh");
    }

    #[test]
    fn test_retention_disabled_by_default() {
        let log = EventLog::in_memory().unwrap();
        log.writer().write("INFO", "kept", None).unwrap();
        let report = log.apply_retention().unwrap();
        assert_eq!(report.purged, 0);
        assert!(report.cutoff.is_none());
    }
}
