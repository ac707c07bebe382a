//! In-memory storage implementations
//!
//! This module provides in-memory implementations of the registry and the
//! event store, suitable for testing and simulation environments.
//!
//! The message log lives behind an `Arc<RwLock<..>>` shared with open
//! cursors. A cursor remembers the highest identifier allocated when it was
//! created and hides anything appended later, which gives the same snapshot
//! semantics as the durable store without copying the log.
//!
//! Scans and counts walk the timeline in chunks of [`SCAN_CHUNK`] entries,
//! taking the read lock once per chunk, so a selective filter over a long
//! log never holds appends off for more than one chunk.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, trace};

use sevlog_core::{
    EventStore, LevelId, LogError, Message, MessageCursor, MessageFilter, MessageId, PageSource,
    Purge, ScanOrder, SeverityLevel, SeverityRegistry, TimelineKey, ceil_micros,
    truncate_to_micros, validate_level_name,
};

/// Timeline entries visited per read-lock hold
pub const SCAN_CHUNK: usize = 1024;

/// Level table guarded as one unit so name and id stay consistent
#[derive(Debug, Default)]
struct LevelTable {
    by_id: BTreeMap<LevelId, SeverityLevel>,
    by_name: HashMap<String, LevelId>,
    /// Last identifier handed out
    last_id: u64,
}

/// In-memory implementation of SeverityRegistry
#[derive(Debug, Default)]
pub struct InMemorySeverityRegistry {
    table: RwLock<LevelTable>,
}

impl InMemorySeverityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered levels
    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    /// Check if no level is registered
    pub fn is_empty(&self) -> bool {
        self.table.read().by_id.is_empty()
    }
}

impl SeverityRegistry for InMemorySeverityRegistry {
    fn resolve(&self, name: &str) -> Result<SeverityLevel, LogError> {
        let table = self.table.read();
        table
            .by_name
            .get(name)
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or_else(|| LogError::unknown_severity(name))
    }

    fn register(&self, name: &str) -> Result<SeverityLevel, LogError> {
        validate_level_name(name)?;

        let mut table = self.table.write();
        if table.by_name.contains_key(name) {
            return Err(LogError::duplicate_severity(name));
        }

        table.last_id += 1;
        let level = SeverityLevel::new(LevelId(table.last_id), name);
        table.by_name.insert(level.name.clone(), level.id);
        table.by_id.insert(level.id, level.clone());

        debug!(level = %level.name, id = %level.id, "Registered severity level");
        Ok(level)
    }

    fn list(&self) -> Result<Vec<SeverityLevel>, LogError> {
        Ok(self.table.read().by_id.values().cloned().collect())
    }

    fn get(&self, id: LevelId) -> Result<Option<SeverityLevel>, LogError> {
        Ok(self.table.read().by_id.get(&id).cloned())
    }
}

/// The message log shared between the store and its cursors
#[derive(Debug, Default)]
struct MemoryLog {
    timeline: BTreeMap<TimelineKey, Message>,
    by_id: HashMap<MessageId, TimelineKey>,
    /// Last identifier handed out (never decreases, even after a purge)
    last_id: u64,
}

impl MemoryLog {
    /// Visit at most [`SCAN_CHUNK`] entries within `bounds`, in `order`
    ///
    /// `visit` returns false to stop early. Returns the last key visited and
    /// whether the range ran out before the chunk did.
    fn walk_chunk(
        &self,
        bounds: (Bound<TimelineKey>, Bound<TimelineKey>),
        order: ScanOrder,
        mut visit: impl FnMut(&Message) -> bool,
    ) -> (Option<TimelineKey>, bool) {
        let range = self.timeline.range(bounds);
        let entries: Box<dyn Iterator<Item = (&TimelineKey, &Message)> + '_> = match order {
            ScanOrder::Ascending => Box::new(range),
            ScanOrder::Descending => Box::new(range.rev()),
        };

        let mut last = None;
        let mut visited = 0;
        for (key, message) in entries.take(SCAN_CHUNK) {
            visited += 1;
            last = Some(*key);
            if !visit(message) {
                return (last, false);
            }
        }
        (last, visited < SCAN_CHUNK)
    }
}

/// In-memory implementation of EventStore
///
/// Appends validate the severity against the paired registry, then allocate
/// the identifier and insert under a single write lock.
pub struct InMemoryEventStore {
    registry: Arc<dyn SeverityRegistry>,
    log: Arc<RwLock<MemoryLog>>,
}

impl InMemoryEventStore {
    /// Create an empty store validating severities against `registry`
    pub fn new(registry: Arc<dyn SeverityRegistry>) -> Self {
        Self {
            registry,
            log: Arc::new(RwLock::new(MemoryLog::default())),
        }
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.log.read().timeline.len()
    }

    /// Check if the store holds no messages
    pub fn is_empty(&self) -> bool {
        self.log.read().timeline.is_empty()
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = self.log.read();
        f.debug_struct("InMemoryEventStore")
            .field("messages", &log.timeline.len())
            .field("last_id", &log.last_id)
            .finish()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        level: LevelId,
        payload: &str,
        source: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId, LogError> {
        // Levels are never removed, so checking before taking the log lock is safe.
        if self.registry.get(level)?.is_none() {
            return Err(LogError::unknown_severity(format!("id {}", level)));
        }

        let mut log = self.log.write();
        log.last_id += 1;
        let id = MessageId(log.last_id);
        let message = Message {
            id,
            level,
            timestamp: truncate_to_micros(timestamp),
            payload: payload.to_string(),
            source: source.map(str::to_string),
        };
        let key = message.timeline_key();
        log.by_id.insert(id, key);
        log.timeline.insert(key, message);

        trace!(id = %id, level = %level, "Appended message");
        Ok(id)
    }

    fn get(&self, id: MessageId) -> Result<Option<Message>, LogError> {
        let log = self.log.read();
        Ok(log
            .by_id
            .get(&id)
            .and_then(|key| log.timeline.get(key))
            .cloned())
    }

    fn scan(&self, filter: &MessageFilter, order: ScanOrder) -> Result<MessageCursor, LogError> {
        filter.validate()?;
        if filter.is_empty_selection() {
            return Ok(MessageCursor::empty());
        }

        let high_water = self.log.read().last_id;
        let pages = MemoryPages {
            log: Arc::clone(&self.log),
            filter: filter.clone(),
            order,
            high_water,
        };
        Ok(MessageCursor::new(pages, filter.limit))
    }

    fn count(&self, filter: &MessageFilter) -> Result<u64, LogError> {
        filter.validate()?;
        if filter.is_empty_selection() {
            return Ok(0);
        }

        let high_water = self.log.read().last_id;
        let limit = filter.limit.unwrap_or(usize::MAX);
        let mut matching = 0usize;
        let mut resume = None;
        while let Some(bounds) = filter.timeline_bounds(resume, ScanOrder::Ascending) {
            let (last, exhausted) = self.log.read().walk_chunk(bounds, ScanOrder::Ascending, |message| {
                if message.id.0 <= high_water
                    && filter.matches_entry(message.level, message.source.as_deref())
                {
                    matching += 1;
                }
                matching < limit
            });
            if exhausted || matching >= limit {
                break;
            }
            resume = last;
        }
        Ok(matching as u64)
    }
}

impl Purge for InMemoryEventStore {
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, LogError> {
        let mut log = self.log.write();
        let upper: Bound<TimelineKey> = Bound::Excluded((ceil_micros(cutoff), 0));
        let expired: Vec<TimelineKey> = log
            .timeline
            .range((Bound::Unbounded, upper))
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            if log.timeline.remove(key).is_some() {
                log.by_id.remove(&MessageId(key.1));
            }
        }

        debug!(purged = expired.len(), cutoff = %cutoff, "Purged messages");
        Ok(expired.len() as u64)
    }
}

/// Snapshot view of the in-memory log for one cursor
struct MemoryPages {
    log: Arc<RwLock<MemoryLog>>,
    filter: MessageFilter,
    order: ScanOrder,
    high_water: u64,
}

impl MemoryPages {
    fn visible(&self, message: &Message) -> bool {
        message.id.0 <= self.high_water
            && self
                .filter
                .matches_entry(message.level, message.source.as_deref())
    }
}

impl PageSource for MemoryPages {
    fn next_page(
        &mut self,
        after: Option<TimelineKey>,
        max: usize,
    ) -> Result<Vec<Message>, LogError> {
        let mut page = Vec::new();
        let mut resume = after;
        while page.len() < max {
            let Some(bounds) = self.filter.timeline_bounds(resume, self.order) else {
                break;
            };
            let (last, exhausted) = self.log.read().walk_chunk(bounds, self.order, |message| {
                if self.visible(message) {
                    page.push(message.clone());
                }
                page.len() < max
            });
            if exhausted {
                break;
            }
            resume = last;
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn create_test_store() -> (Arc<InMemorySeverityRegistry>, InMemoryEventStore) {
        let registry = Arc::new(InMemorySeverityRegistry::new());
        registry.provision(&["INFO", "ERROR"]).unwrap();
        let store = InMemoryEventStore::new(registry.clone());
        (registry, store)
    }

    #[test]
    fn test_register_assigns_monotonic_ids() {
        let registry = InMemorySeverityRegistry::new();
        let info = registry.register("INFO").unwrap();
        let error = registry.register("ERROR").unwrap();
        assert_eq!(info.id, LevelId(1));
        assert_eq!(error.id, LevelId(2));

        assert_eq!(registry.resolve("INFO").unwrap(), info);
        assert!(matches!(
            registry.resolve("info"),
            Err(LogError::UnknownSeverity(_))
        ));
    }

    #[test]
    fn test_duplicate_register_leaves_registry_unchanged() {
        let registry = InMemorySeverityRegistry::new();
        registry.register("INFO").unwrap();

        let err = registry.register("INFO").unwrap_err();
        assert!(matches!(err, LogError::DuplicateSeverity(_)));
        assert_eq!(registry.list().unwrap().len(), 1);

        // The failed attempt does not consume an identifier
        assert_eq!(registry.register("ERROR").unwrap().id, LevelId(2));
    }

    #[test]
    fn test_blank_name_rejected() {
        let registry = InMemorySeverityRegistry::new();
        assert!(matches!(
            registry.register(" "),
            Err(LogError::InvalidSeverityName(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_append_rejects_unknown_level() {
        let (_registry, store) = create_test_store();
        let err = store.append(LevelId(99), "x", None, at(0)).unwrap_err();
        assert!(matches!(err, LogError::UnknownSeverity(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_query_orders_by_timestamp_then_id() {
        let (_registry, store) = create_test_store();
        let late = store.append(LevelId(1), "late", None, at(10)).unwrap();
        let early = store.append(LevelId(1), "early", None, at(5)).unwrap();
        let tie = store.append(LevelId(2), "tie", None, at(10)).unwrap();

        let ids: Vec<_> = store
            .query(&MessageFilter::all())
            .unwrap()
            .map(|m| m.unwrap().id)
            .collect();
        assert_eq!(ids, vec![early, late, tie]);
    }

    #[test]
    fn test_cursor_is_a_snapshot() {
        let (_registry, store) = create_test_store();
        for i in 0..5 {
            store.append(LevelId(1), "before", None, at(i)).unwrap();
        }

        let cursor = store.query(&MessageFilter::all()).unwrap().with_page_size(2);
        store.append(LevelId(1), "after", None, at(100)).unwrap();

        let seen = cursor.collect_messages().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|m| m.payload == "before"));
    }

    #[test]
    fn test_descending_scan() {
        let (_registry, store) = create_test_store();
        for i in 0..5 {
            store.append(LevelId(1), &format!("m{}", i), None, at(i)).unwrap();
        }

        let newest: Vec<_> = store
            .scan(&MessageFilter::all().with_limit(2), ScanOrder::Descending)
            .unwrap()
            .map(|m| m.unwrap().payload)
            .collect();
        assert_eq!(newest, vec!["m4", "m3"]);
    }

    #[test]
    fn test_count_honors_filter_and_limit() {
        let (_registry, store) = create_test_store();
        for i in 0..10 {
            let level = if i % 2 == 0 { LevelId(1) } else { LevelId(2) };
            store.append(level, "x", Some("ingest"), at(i)).unwrap();
        }

        let errors = MessageFilter::all().with_severity(LevelId(2));
        assert_eq!(store.count(&errors).unwrap(), 5);
        assert_eq!(store.count(&errors.clone().with_limit(3)).unwrap(), 3);

        let window = MessageFilter::all().since(at(2)).until(at(6));
        assert_eq!(store.count(&window).unwrap(), 4);

        let other = MessageFilter::all().source_exact("classify");
        assert_eq!(store.count(&other).unwrap(), 0);
    }

    #[test]
    fn test_purge_never_reuses_ids() {
        let (_registry, store) = create_test_store();
        for i in 0..4 {
            store.append(LevelId(1), "old", None, at(i)).unwrap();
        }

        let purged = store.purge_before(at(2)).unwrap();
        assert_eq!(purged, 2);
        assert_eq!(store.len(), 2);
        assert!(store.get(MessageId(1)).unwrap().is_none());

        let next = store
            .append(LevelId(1), "new", None, at(2) + Duration::seconds(100))
            .unwrap();
        assert_eq!(next, MessageId(5));
    }

    #[test]
    fn test_append_keeps_microsecond_precision() {
        let (_registry, store) = create_test_store();
        let later = store
            .append(LevelId(1), "later", None, at(0) + Duration::nanoseconds(900))
            .unwrap();
        let earlier = store
            .append(LevelId(1), "earlier", None, at(0) + Duration::nanoseconds(100))
            .unwrap();

        // Both land on the same microsecond, so insertion order breaks the tie
        let messages = store.query(&MessageFilter::all()).unwrap().collect_messages().unwrap();
        assert_eq!(messages[0].id, later);
        assert_eq!(messages[1].id, earlier);
        assert!(messages.iter().all(|m| m.timestamp == at(0)));
        assert_eq!(store.get(later).unwrap().unwrap().timestamp, at(0));
    }

    #[test]
    fn test_purge_cutoff_between_microseconds() {
        let (_registry, store) = create_test_store();
        store.append(LevelId(1), "at cutoff micro", None, at(0)).unwrap();

        // The message at 0us is strictly before 0us + 500ns
        let purged = store.purge_before(at(0) + Duration::nanoseconds(500)).unwrap();
        assert_eq!(purged, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_selective_scans_cross_chunk_boundaries() {
        let (_registry, store) = create_test_store();
        let total = SCAN_CHUNK * 3 + 7;
        for i in 0..total {
            let rare = i == 3 || i == SCAN_CHUNK + 1 || i == total - 1;
            let level = if rare { LevelId(2) } else { LevelId(1) };
            store.append(level, &format!("m{}", i), None, at(i as i64)).unwrap();
        }

        let errors = MessageFilter::all().with_severity(LevelId(2));
        assert_eq!(store.count(&errors).unwrap(), 3);
        assert_eq!(store.count(&errors.clone().with_limit(2)).unwrap(), 2);
        assert_eq!(store.count(&MessageFilter::all()).unwrap(), total as u64);

        let ascending: Vec<_> = store
            .query(&errors)
            .unwrap()
            .map(|m| m.unwrap().payload)
            .collect();
        let expected = vec![
            "m3".to_string(),
            format!("m{}", SCAN_CHUNK + 1),
            format!("m{}", total - 1),
        ];
        assert_eq!(ascending, expected);

        let descending: Vec<_> = store
            .scan(&errors, ScanOrder::Descending)
            .unwrap()
            .map(|m| m.unwrap().payload)
            .collect();
        assert_eq!(descending, expected.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_chunked_scan_stays_a_snapshot() {
        let (_registry, store) = create_test_store();
        for i in 0..(SCAN_CHUNK * 2) {
            store.append(LevelId(1), "before", None, at(i as i64)).unwrap();
        }

        let mut cursor = store.query(&MessageFilter::all()).unwrap();
        let first = cursor.next().unwrap().unwrap();
        for i in 0..SCAN_CHUNK {
            store.append(LevelId(1), "after", None, at(i as i64)).unwrap();
        }

        let rest = cursor.collect_messages().unwrap();
        assert_eq!(first.payload, "before");
        assert_eq!(rest.len(), SCAN_CHUNK * 2 - 1);
        assert!(rest.iter().all(|m| m.payload == "before"));
    }
}
