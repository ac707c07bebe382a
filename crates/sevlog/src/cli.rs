//! Command-line interface

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use sevlog_core::MessageId;
use sevlog_storage::RetentionPolicyBuilder;

use crate::format::{MessageFormatter, OutputFormat, format_level};
use crate::log::EventLog;
use crate::reader::LogQuery;

#[derive(Parser)]
#[command(name = "sevlog", about = "Severity-leveled event log", version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "SEVLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides the configured storage)
    #[arg(long, global = true, env = "SEVLOG_DB")]
    pub db: Option<PathBuf>,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and provision the configured severity levels
    Init,
    /// Inspect or extend the severity levels
    Levels {
        #[command(subcommand)]
        command: LevelsCommand,
    },
    /// Record one message
    Write {
        /// Severity level name (case-sensitive)
        level: String,
        /// Message text
        payload: String,
        /// Source tag
        #[arg(long)]
        source: Option<String>,
    },
    /// Print matching messages, oldest first
    Find(FilterArgs),
    /// Print the most recent matching messages, newest first
    Tail {
        /// Number of messages
        #[arg(short = 'n', long = "lines", default_value_t = 10)]
        lines: usize,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Count matching messages
    Count(FilterArgs),
    /// Print one message by identifier
    Show {
        id: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove old messages
    Purge {
        /// Age limit in days (defaults to the configured retention)
        #[arg(long)]
        older_than_days: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum LevelsCommand {
    /// List registered levels
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Register a new level
    Add {
        /// Level name (case-sensitive, must be unused)
        name: String,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Severity level to match (repeatable)
    #[arg(long = "level")]
    pub levels: Vec<String>,

    /// Only messages at or after this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Only messages strictly before this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    /// Only messages with exactly this source tag
    #[arg(long, conflicts_with = "source_prefix")]
    pub source: Option<String>,

    /// Only messages whose source tag starts with this prefix
    #[arg(long)]
    pub source_prefix: Option<String>,

    /// Maximum number of messages
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl FilterArgs {
    pub fn to_query(&self) -> LogQuery {
        let mut query = LogQuery::all();
        if !self.levels.is_empty() {
            query = query.with_severities(self.levels.iter().cloned());
        }
        if let Some(since) = self.since {
            query = query.since(since);
        }
        if let Some(until) = self.until {
            query = query.until(until);
        }
        if let Some(source) = &self.source {
            query = query.source_exact(source.clone());
        }
        if let Some(prefix) = &self.source_prefix {
            query = query.source_prefix(prefix.clone());
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        query
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

/// Execute one command against an open log, printing results to `out`
pub fn run(log: &EventLog, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            let levels = log.reader().levels()?;
            writeln!(out, "initialized with {} severity levels", levels.len())?;
        }
        Command::Levels { command } => match command {
            LevelsCommand::List { format } => {
                for level in log.reader().levels()? {
                    writeln!(out, "{}", format_level(&level, format)?)?;
                }
            }
            LevelsCommand::Add { name } => {
                let level = log.register_level(&name)?;
                writeln!(out, "{}", format_level(&level, OutputFormat::Text)?)?;
            }
        },
        Command::Write {
            level,
            payload,
            source,
        } => {
            let id = log.writer().write(&level, &payload, source.as_deref())?;
            writeln!(out, "{}", id)?;
        }
        Command::Find(filter) => {
            let reader = log.reader();
            let formatter = MessageFormatter::new(filter.format, &reader.levels()?);
            for message in reader.find(&filter.to_query())? {
                writeln!(out, "{}", formatter.format(&message?)?)?;
            }
        }
        Command::Tail { lines, filter } => {
            let reader = log.reader();
            let formatter = MessageFormatter::new(filter.format, &reader.levels()?);
            for message in reader.tail(lines, &filter.to_query())? {
                writeln!(out, "{}", formatter.format(&message)?)?;
            }
        }
        Command::Count(filter) => {
            writeln!(out, "{}", log.reader().count(&filter.to_query())?)?;
        }
        Command::Show { id, format } => {
            let reader = log.reader();
            let message = reader
                .get(MessageId(id))?
                .with_context(|| format!("no message with id {}", id))?;
            let formatter = MessageFormatter::new(format, &reader.levels()?);
            writeln!(out, "{}", formatter.format(&message)?)?;
        }
        Command::Purge { older_than_days } => {
            let policy = match older_than_days {
                Some(days) => RetentionPolicyBuilder::new().max_age_days(days).build(),
                None => *log.retention_policy(),
            };
            if !policy.is_enabled() {
                bail!("no retention configured; pass --older-than-days");
            }
            let report = log.apply_policy(&policy)?;
            writeln!(out, "purged {} messages", report.purged)?;
        }
    }
    Ok(())
}
