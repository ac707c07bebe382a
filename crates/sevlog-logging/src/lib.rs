//! Diagnostic logging for the severity-leveled event log
//!
//! The engine reports its own activity (opens, appends, purges) through
//! `tracing`. This crate wires those spans and events to a subscriber:
//! human-readable or JSONL output on stderr, plus optional JSONL files with
//! rotation via tracing-appender.
//!
//! # Quick Start
//!
//! ```ignore
//! use sevlog_logging::{LogConfig, SevlogSubscriberBuilder};
//!
//! // Pretty console output on stderr
//! let _guard = SevlogSubscriberBuilder::new().init();
//!
//! // JSONL files only, rotated daily
//! let _guard = SevlogSubscriberBuilder::new()
//!     .with_config(LogConfig::production("/var/log/sevlog".into()))
//!     .init();
//! ```
//!
//! The returned guard flushes buffered file output on drop and must be kept
//! alive for the duration of the program.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, OpenOptions};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Failed to open log output: {0}")]
    Output(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output is pretty-printed to stderr at `info`.
/// `RUST_LOG`, when set, takes precedence over the configured default level.
#[derive(Debug, Default)]
pub struct SevlogSubscriberBuilder {
    config: LogConfig,
}

impl SevlogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration that will be installed
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally, reporting failures on stderr
    ///
    /// Logging is never fatal: if a subscriber is already installed or the
    /// log directory cannot be opened, the process continues without it.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    /// Initialize the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = build_env_filter(&self.config)?;

        let (file_writer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = create_file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let registry = Registry::default().with(env_filter);
        let console = &self.config.console;
        let jsonl = self.config.jsonl.clone();

        // Separate arms keep each layer stack concretely typed
        let result = match (console.enabled, console.pretty, file_writer) {
            // Pretty console + File
            (true, true, Some(file)) => registry
                .with(pretty_layer(console.ansi))
                .with(json_layer(jsonl, file))
                .try_init(),

            // JSONL console + File
            (true, false, Some(file)) => registry
                .with(json_layer(jsonl.clone(), std::io::stderr))
                .with(json_layer(jsonl, file))
                .try_init(),

            // Pretty console only
            (true, true, None) => registry.with(pretty_layer(console.ansi)).try_init(),

            // JSONL console only
            (true, false, None) => registry
                .with(json_layer(jsonl, std::io::stderr))
                .try_init(),

            // File only
            (false, _, Some(file)) => registry.with(json_layer(jsonl, file)).try_init(),

            // Silent
            (false, _, None) => registry.try_init(),
        };

        result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }
}

/// Initialize logging for tests
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = SevlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

/// Build the level filter from `RUST_LOG` or the configured defaults
pub fn build_env_filter(config: &LogConfig) -> Result<EnvFilter, LoggingError> {
    let mut filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_level).map_err(|e| {
            LoggingError::InvalidDirective {
                directive: config.default_level.clone(),
                reason: e.to_string(),
            }
        })?,
    };

    for directive in config.target_directives() {
        let parsed = directive
            .parse()
            .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidDirective {
                directive: directive.clone(),
                reason: e.to_string(),
            })?;
        filter = filter.add_directive(parsed);
    }

    Ok(filter)
}

fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory).map_err(|e| LoggingError::Output(e.to_string()))?;

    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)
                .map_err(|e| LoggingError::Output(format!("{}: {}", file_path.display(), e)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = file_config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Output(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

fn pretty_layer<S>(ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(std::io::stderr)
}

fn json_layer<S, W>(jsonl: JsonlConfig, writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(jsonl.include_current_span)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_writer(writer)
}
