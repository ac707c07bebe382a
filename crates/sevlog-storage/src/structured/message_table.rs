//! Message table and timeline index
//!
//! Messages are stored twice: the full record keyed by identifier, and a
//! small timeline entry keyed by `(timestamp, id)` carrying just the
//! severity and source. Scans and counts walk the timeline; only matching
//! entries are looked up in the message table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use sevlog_core::{
    EventStore, LevelId, LogError, Message, MessageCursor, MessageFilter, MessageId, PageSource,
    Purge, ScanOrder, TimelineKey, ceil_micros,
};

use super::tables::{MESSAGE_LEVELS, MESSAGE_SEQUENCE, MESSAGE_TIMELINE, MESSAGES, RedbStorage};

/// Full message record as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMessage {
    level: u64,
    timestamp_micros: i64,
    source: Option<String>,
    payload: String,
}

impl StoredMessage {
    fn into_message(self, id: u64) -> Result<Message, LogError> {
        let timestamp = DateTime::from_timestamp_micros(self.timestamp_micros).ok_or_else(|| {
            LogError::Deserialization(format!(
                "timestamp out of range for message {}: {}",
                id, self.timestamp_micros
            ))
        })?;
        Ok(Message {
            id: MessageId(id),
            level: LevelId(self.level),
            timestamp,
            payload: self.payload,
            source: self.source,
        })
    }
}

/// Timeline index entry: just enough to evaluate a filter
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TimelineEntry {
    level: u64,
    source: Option<String>,
}

impl TimelineEntry {
    fn matches(&self, filter: &MessageFilter) -> bool {
        filter.matches_entry(LevelId(self.level), self.source.as_deref())
    }
}

fn decode_message(id: u64, bytes: &[u8]) -> Result<Message, LogError> {
    postcard::from_bytes::<StoredMessage>(bytes)?.into_message(id)
}

fn decode_entry(bytes: &[u8]) -> Result<TimelineEntry, LogError> {
    Ok(postcard::from_bytes(bytes)?)
}

/// Durable event store
///
/// Each append is one write transaction that checks the severity reference,
/// allocates the identifier, and writes both the record and its timeline
/// entry. Either all of it commits or none of it does.
#[derive(Debug)]
pub struct RedbEventStore {
    storage: Arc<RedbStorage>,
}

impl RedbEventStore {
    /// Create a store over shared storage
    pub fn new(storage: Arc<RedbStorage>) -> Self {
        Self { storage }
    }
}

impl EventStore for RedbEventStore {
    #[instrument(skip(self, payload))]
    fn append(
        &self,
        level: LevelId,
        payload: &str,
        source: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId, LogError> {
        let timestamp_micros = timestamp.timestamp_micros();
        let record = StoredMessage {
            level: level.0,
            timestamp_micros,
            source: source.map(str::to_string),
            payload: payload.to_string(),
        };
        let entry = TimelineEntry {
            level: level.0,
            source: record.source.clone(),
        };
        let record_bytes =
            postcard::to_allocvec(&record).map_err(|e| LogError::Serialization(e.to_string()))?;
        let entry_bytes =
            postcard::to_allocvec(&entry).map_err(|e| LogError::Serialization(e.to_string()))?;

        let write_txn = self.storage.begin_write()?;
        let id = {
            let levels = write_txn
                .open_table(MESSAGE_LEVELS)
                .map_err(LogError::storage)?;
            if levels.get(level.0).map_err(LogError::storage)?.is_none() {
                return Err(LogError::unknown_severity(format!("id {}", level)));
            }

            let id = RedbStorage::next_sequence(&write_txn, MESSAGE_SEQUENCE)?;

            let mut messages = write_txn.open_table(MESSAGES).map_err(LogError::storage)?;
            messages
                .insert(id, record_bytes.as_slice())
                .map_err(LogError::storage)?;

            let mut timeline = write_txn
                .open_table(MESSAGE_TIMELINE)
                .map_err(LogError::storage)?;
            timeline
                .insert((timestamp_micros, id), entry_bytes.as_slice())
                .map_err(LogError::storage)?;
            id
        };
        write_txn.commit().map_err(LogError::storage)?;

        trace!(id = id, "Appended message");
        Ok(MessageId(id))
    }

    fn get(&self, id: MessageId) -> Result<Option<Message>, LogError> {
        let read_txn = self.storage.begin_read()?;
        let messages = read_txn.open_table(MESSAGES).map_err(LogError::storage)?;

        match messages.get(id.0).map_err(LogError::storage)? {
            Some(bytes) => decode_message(id.0, bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn scan(&self, filter: &MessageFilter, order: ScanOrder) -> Result<MessageCursor, LogError> {
        filter.validate()?;
        if filter.is_empty_selection() {
            return Ok(MessageCursor::empty());
        }

        let pages = RedbPages {
            read_txn: self.storage.begin_read()?,
            filter: filter.clone(),
            order,
        };
        Ok(MessageCursor::new(pages, filter.limit))
    }

    fn count(&self, filter: &MessageFilter) -> Result<u64, LogError> {
        filter.validate()?;
        if filter.is_empty_selection() {
            return Ok(0);
        }
        let Some(bounds) = filter.timeline_bounds(None, ScanOrder::Ascending) else {
            return Ok(0);
        };

        let read_txn = self.storage.begin_read()?;
        let timeline = read_txn
            .open_table(MESSAGE_TIMELINE)
            .map_err(LogError::storage)?;

        let limit = filter.limit.map_or(u64::MAX, |l| l as u64);
        let mut count = 0u64;
        for item in timeline.range::<TimelineKey>(bounds).map_err(LogError::storage)? {
            if count >= limit {
                break;
            }
            let (_key, value) = item.map_err(LogError::storage)?;
            if decode_entry(value.value())?.matches(filter) {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl Purge for RedbEventStore {
    #[instrument(skip(self))]
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LogError> {
        let write_txn = self.storage.begin_write()?;
        let purged = {
            let mut timeline = write_txn
                .open_table(MESSAGE_TIMELINE)
                .map_err(LogError::storage)?;
            let mut expired: Vec<TimelineKey> = Vec::new();
            for item in timeline
                .range::<TimelineKey>(..(ceil_micros(cutoff), 0))
                .map_err(LogError::storage)?
            {
                let (key, _value) = item.map_err(LogError::storage)?;
                expired.push(key.value());
            }

            let mut messages = write_txn.open_table(MESSAGES).map_err(LogError::storage)?;
            for key in &expired {
                timeline.remove(key).map_err(LogError::storage)?;
                messages.remove(key.1).map_err(LogError::storage)?;
            }
            expired.len() as u64
        };
        write_txn.commit().map_err(LogError::storage)?;

        debug!(purged = purged, "Purged messages");
        Ok(purged)
    }
}

/// Page source holding one read transaction for the life of a cursor
struct RedbPages {
    read_txn: ReadTransaction,
    filter: MessageFilter,
    order: ScanOrder,
}

impl PageSource for RedbPages {
    fn next_page(
        &mut self,
        after: Option<TimelineKey>,
        max: usize,
    ) -> Result<Vec<Message>, LogError> {
        let Some(bounds) = self.filter.timeline_bounds(after, self.order) else {
            return Ok(Vec::new());
        };

        let timeline = self
            .read_txn
            .open_table(MESSAGE_TIMELINE)
            .map_err(LogError::storage)?;
        let messages = self
            .read_txn
            .open_table(MESSAGES)
            .map_err(LogError::storage)?;

        let range = timeline
            .range::<TimelineKey>(bounds)
            .map_err(LogError::storage)?;
        let entries: Box<dyn Iterator<Item = _>> = match self.order {
            ScanOrder::Ascending => Box::new(range),
            ScanOrder::Descending => Box::new(range.rev()),
        };

        let mut page = Vec::with_capacity(max.min(1024));
        for item in entries {
            if page.len() >= max {
                break;
            }
            let (key, value) = item.map_err(LogError::storage)?;
            if !decode_entry(value.value())?.matches(&self.filter) {
                continue;
            }

            let (_timestamp, id) = key.value();
            // A concurrent purge cannot reach this snapshot, so the record exists.
            let bytes = messages
                .get(id)
                .map_err(LogError::storage)?
                .ok_or_else(|| LogError::storage(format!("message {} missing from table", id)))?;
            page.push(decode_message(id, bytes.value())?);
        }
        Ok(page)
    }
}
