//! # Sevlog
//!
//! A severity-leveled, timestamped event log.
//!
//! Producers record messages at named severity levels through a
//! [`LogWriter`]; consumers query them back by severity, time range, and
//! source through a [`LogReader`]. Both sit on the storage traits from
//! `sevlog-core`, backed by memory or a redb database.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sevlog::{EventLog, LogQuery};
//!
//! let log = EventLog::in_memory()?;
//! let pipeline = log.writer().with_source("refitt.pipeline");
//! pipeline.write("INFO", "forecast published")?;
//! pipeline.write("ERROR", "disk full")?;
//!
//! let errors = log.reader().find(&LogQuery::all().with_severity("ERROR"))?;
//! for message in errors {
//!     println!("{}", message?.payload);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod format;
pub mod log;
pub mod reader;
pub mod writer;

pub use config::{ConfigError, EngineConfig, RetentionConfig, SeverityConfig, StorageBackend, StorageConfig};
pub use format::{MessageFormatter, OutputFormat};
pub use log::EventLog;
pub use reader::{LogQuery, LogReader};
pub use writer::{LogWriter, SourceWriter};

pub use sevlog_core::{
    Clock, LevelId, LogError, ManualClock, Message, MessageCursor, MessageId, SeverityLevel,
    SourceMatch, SystemClock,
};
pub use sevlog_storage::{RetentionPolicy, RetentionReport};
