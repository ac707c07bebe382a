//! Producer side of the event log

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use sevlog_core::{Clock, EventStore, LogError, MessageId, SeverityRegistry, SystemClock};

/// Writes messages at named severity levels
///
/// Each write resolves the level name, stamps the message with the writer's
/// clock, and appends it to the store exactly once. Timestamps handed out by
/// one writer (and its clones) never go backwards, even if the clock does.
#[derive(Clone)]
pub struct LogWriter {
    inner: Arc<WriterInner>,
}

struct WriterInner {
    registry: Arc<dyn SeverityRegistry>,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    /// Last timestamp handed out, in microseconds since the epoch
    last_micros: Mutex<i64>,
}

impl LogWriter {
    /// Create a writer stamping messages with the system clock
    pub fn new(registry: Arc<dyn SeverityRegistry>, store: Arc<dyn EventStore>) -> Self {
        Self::with_clock(registry, store, Arc::new(SystemClock))
    }

    /// Create a writer with an explicit clock
    pub fn with_clock(
        registry: Arc<dyn SeverityRegistry>,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(WriterInner {
                registry,
                store,
                clock,
                last_micros: Mutex::new(i64::MIN),
            }),
        }
    }

    /// Record one message
    ///
    /// # Errors
    ///
    /// Returns [`LogError::UnknownSeverity`] if `level` is not registered;
    /// nothing is stored in that case.
    #[instrument(skip(self, payload), fields(payload_len = payload.len()))]
    pub fn write(
        &self,
        level: &str,
        payload: &str,
        source: Option<&str>,
    ) -> Result<MessageId, LogError> {
        let severity = self.inner.registry.resolve(level)?;
        let timestamp = self.next_timestamp();
        let id = self
            .inner
            .store
            .append(severity.id, payload, source, timestamp)?;
        debug!(id = %id, "Wrote message");
        Ok(id)
    }

    /// A writer that tags every message with `source`
    pub fn with_source(&self, source: impl Into<String>) -> SourceWriter {
        SourceWriter {
            writer: self.clone(),
            source: source.into(),
        }
    }

    /// Current clock reading, clamped to the last timestamp handed out
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = self.inner.clock.now_utc();
        let mut last = self.inner.last_micros.lock();
        let micros = now.timestamp_micros().max(*last);
        *last = micros;
        DateTime::from_timestamp_micros(micros).unwrap_or(now)
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("last_micros", &*self.inner.last_micros.lock())
            .finish_non_exhaustive()
    }
}

/// A [`LogWriter`] bound to a fixed source tag
#[derive(Debug, Clone)]
pub struct SourceWriter {
    writer: LogWriter,
    source: String,
}

impl SourceWriter {
    /// The source tag attached to every message
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Record one message under this writer's source tag
    pub fn write(&self, level: &str, payload: &str) -> Result<MessageId, LogError> {
        self.writer.write(level, payload, Some(&self.source))
    }
}
