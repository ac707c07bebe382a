//! Rendering messages for humans and machines
//!
//! The text form uses padded syslog-style columns for timestamp, source,
//! level and payload. Messages carry no host, so there is no host column:
//!
//! ```text
//! 2024-05-01 12:00:03.250 refitt.pipeline        ERROR    disk full
//! ```
//!
//! The JSON form is one object per line.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::Serialize;

use sevlog_core::{LevelId, LogError, Message, SeverityLevel};

/// Timestamp layout of the text format (millisecond precision)
pub const TEXT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Placeholder printed for messages without a source tag
pub const NO_SOURCE: &str = "-";

/// Output format for rendered messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Syslog-style padded columns
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// JSON view of a message, with the level resolved to its name
#[derive(Debug, Serialize)]
struct MessageRecord<'a> {
    id: u64,
    timestamp: String,
    level: &'a str,
    source: Option<&'a str>,
    payload: &'a str,
}

/// Renders messages with level names looked up once up front
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    format: OutputFormat,
    names: BTreeMap<LevelId, String>,
}

impl MessageFormatter {
    pub fn new(format: OutputFormat, levels: &[SeverityLevel]) -> Self {
        let names = levels
            .iter()
            .map(|level| (level.id, level.name.clone()))
            .collect();
        Self { format, names }
    }

    /// Render one message as a single line (no trailing newline)
    pub fn format(&self, message: &Message) -> Result<String, LogError> {
        let fallback;
        let level = match self.names.get(&message.level) {
            Some(name) => name.as_str(),
            None => {
                fallback = message.level.to_string();
                fallback.as_str()
            }
        };

        match self.format {
            OutputFormat::Text => Ok(format!(
                "{} {:<22} {:<8} {}",
                message.timestamp.format(TEXT_TIMESTAMP_FORMAT),
                message.source.as_deref().unwrap_or(NO_SOURCE),
                level,
                message.payload
            )),
            OutputFormat::Json => {
                let record = MessageRecord {
                    id: message.id.0,
                    timestamp: message.timestamp.to_rfc3339(),
                    level,
                    source: message.source.as_deref(),
                    payload: &message.payload,
                };
                serde_json::to_string(&record).map_err(|e| LogError::Serialization(e.to_string()))
            }
        }
    }
}

/// Render a severity level for listings
pub fn format_level(level: &SeverityLevel, format: OutputFormat) -> Result<String, LogError> {
    match format {
        OutputFormat::Text => Ok(format!("{:>4}  {}", level.id.0, level.name)),
        OutputFormat::Json => {
            serde_json::to_string(level).map_err(|e| LogError::Serialization(e.to_string()))
        }
    }
}
