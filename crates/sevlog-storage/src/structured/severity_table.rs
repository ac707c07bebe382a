//! Severity level table
//!
//! Stores the registered severity levels and enforces name uniqueness.

use std::sync::Arc;

use redb::ReadableTable;
use tracing::debug;

use sevlog_core::{LevelId, LogError, SeverityLevel, SeverityRegistry, validate_level_name};

use super::tables::{LEVEL_SEQUENCE, MESSAGE_LEVEL_NAMES, MESSAGE_LEVELS, RedbStorage};

/// Durable severity registry
///
/// Registration runs in a single write transaction, and redb admits one
/// writer at a time, so concurrent registrations of one name cannot both
/// succeed.
#[derive(Debug)]
pub struct RedbSeverityRegistry {
    storage: Arc<RedbStorage>,
}

impl RedbSeverityRegistry {
    /// Create a registry over shared storage
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }

    /// Count all registered levels
    pub fn count(&self) -> Result<usize, LogError> {
        Ok(self.list()?.len())
    }
}

impl SeverityRegistry for RedbSeverityRegistry {
    fn resolve(&self, name: &str) -> Result<SeverityLevel, LogError> {
        let read_txn = self.storage.begin_read()?;
        let names = read_txn
            .open_table(MESSAGE_LEVEL_NAMES)
            .map_err(LogError::storage)?;

        match names.get(name).map_err(LogError::storage)? {
            Some(id) => Ok(SeverityLevel::new(LevelId(id.value()), name)),
            None => Err(LogError::unknown_severity(name)),
        }
    }

    fn register(&self, name: &str) -> Result<SeverityLevel, LogError> {
        validate_level_name(name)?;

        let write_txn = self.storage.begin_write()?;
        let id = {
            let mut names = write_txn
                .open_table(MESSAGE_LEVEL_NAMES)
                .map_err(LogError::storage)?;
            if names.get(name).map_err(LogError::storage)?.is_some() {
                // Dropping the transaction aborts it
                return Err(LogError::duplicate_severity(name));
            }

            let id = RedbStorage::next_sequence(&write_txn, LEVEL_SEQUENCE)?;
            names.insert(name, id).map_err(LogError::storage)?;

            let mut levels = write_txn
                .open_table(MESSAGE_LEVELS)
                .map_err(LogError::storage)?;
            levels.insert(id, name).map_err(LogError::storage)?;
            id
        };
        write_txn.commit().map_err(LogError::storage)?;

        debug!(level = name, id = id, "Registered severity level");
        Ok(SeverityLevel::new(LevelId(id), name))
    }

    fn list(&self) -> Result<Vec<SeverityLevel>, LogError> {
        let read_txn = self.storage.begin_read()?;
        let levels = read_txn
            .open_table(MESSAGE_LEVELS)
            .map_err(LogError::storage)?;

        let mut result = Vec::new();
        for entry in levels.iter().map_err(LogError::storage)? {
            let (id, name) = entry.map_err(LogError::storage)?;
            result.push(SeverityLevel::new(LevelId(id.value()), name.value()));
        }
        Ok(result)
    }

    fn get(&self, id: LevelId) -> Result<Option<SeverityLevel>, LogError> {
        let read_txn = self.storage.begin_read()?;
        let levels = read_txn
            .open_table(MESSAGE_LEVELS)
            .map_err(LogError::storage)?;

        let level = levels
            .get(id.0)
            .map_err(LogError::storage)?
            .map(|name| SeverityLevel::new(id, name.value()));
        Ok(level)
    }
}
