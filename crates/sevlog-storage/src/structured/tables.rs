//! redb table definitions and storage manager
//!
//! Defines all tables used for durable storage.

use std::path::PathBuf;
use std::sync::Arc;

use redb::{
    Database, Durability, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction,
};
use tracing::{debug, info, instrument};

use sevlog_core::LogError;

// Key: MessageLevelID, Value: MessageLevelName
pub const MESSAGE_LEVELS: TableDefinition<u64, &str> = TableDefinition::new("message_level");

// Key: MessageLevelName, Value: MessageLevelID (uniqueness index)
pub const MESSAGE_LEVEL_NAMES: TableDefinition<&str, u64> =
    TableDefinition::new("message_level_name");

// Key: MessageID, Value: serialized StoredMessage
pub const MESSAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("message");

// Key: (timestamp micros, MessageID), Value: serialized TimelineEntry
pub const MESSAGE_TIMELINE: TableDefinition<(i64, u64), &[u8]> =
    TableDefinition::new("message_timeline");

// Key: sequence name, Value: last identifier handed out
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequence");

/// Sequence backing severity level identifiers
pub const LEVEL_SEQUENCE: &str = "message_level";

/// Sequence backing message identifiers
pub const MESSAGE_SEQUENCE: &str = "message";

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
    /// Whether each commit is flushed to disk before returning
    pub sync_on_write: bool,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/sevlog.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
            sync_on_write: true,
        }
    }
}

/// Main redb storage manager
///
/// Shared via `Arc` by the registry and the event store, which makes the
/// level table and the message table live in one database, so the store
/// can check severity references inside its own write transaction.
pub struct RedbStorage {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl RedbStorage {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, LogError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(LogError::storage)?;

        info!("Opened redb database");

        let storage = Self {
            db: Arc::new(db),
            config,
        };

        // Initialize tables
        storage.init_tables()?;

        Ok(storage)
    }

    /// Initialize all tables
    fn init_tables(&self) -> Result<(), LogError> {
        let write_txn = self.begin_write()?;

        // Create tables if they don't exist
        write_txn
            .open_table(MESSAGE_LEVELS)
            .map_err(LogError::storage)?;
        write_txn
            .open_table(MESSAGE_LEVEL_NAMES)
            .map_err(LogError::storage)?;
        write_txn.open_table(MESSAGES).map_err(LogError::storage)?;
        write_txn
            .open_table(MESSAGE_TIMELINE)
            .map_err(LogError::storage)?;
        write_txn.open_table(SEQUENCES).map_err(LogError::storage)?;

        write_txn.commit().map_err(LogError::storage)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get a reference to the database
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }

    /// Start a write transaction with the configured durability
    pub fn begin_write(&self) -> Result<WriteTransaction, LogError> {
        let mut txn = self.db.begin_write().map_err(LogError::storage)?;
        if !self.config.sync_on_write {
            txn.set_durability(Durability::Eventual);
        }
        Ok(txn)
    }

    /// Start a read transaction (a consistent snapshot)
    pub fn begin_read(&self) -> Result<ReadTransaction, LogError> {
        self.db.begin_read().map_err(LogError::storage)
    }

    /// Allocate the next identifier of a sequence inside `txn`
    ///
    /// The counter only moves forward, and only commits together with the
    /// record that uses it.
    pub fn next_sequence(txn: &WriteTransaction, sequence: &str) -> Result<u64, LogError> {
        let mut table = txn.open_table(SEQUENCES).map_err(LogError::storage)?;
        let last = table
            .get(sequence)
            .map_err(LogError::storage)?
            .map(|v| v.value())
            .unwrap_or(0);
        let next = last + 1;
        table.insert(sequence, next).map_err(LogError::storage)?;
        Ok(next)
    }
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage")
            .field("config", &self.config)
            .finish()
    }
}
