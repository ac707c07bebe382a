//! Lazily paged query results
//!
//! Backends implement [`PageSource`] over a read snapshot; [`MessageCursor`]
//! drives it one page at a time, tracking the resume position and the
//! filter's result limit. Dropping a cursor abandons the read.

use std::collections::VecDeque;
use std::fmt;

use crate::error::LogError;
use crate::types::{Message, TimelineKey};

/// Default number of messages fetched per page
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Direction of a timeline scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Oldest first: `(timestamp, id)` ascending
    #[default]
    Ascending,
    /// Newest first: `(timestamp, id)` descending
    Descending,
}

/// A snapshot of matching messages that can be read page by page
pub trait PageSource {
    /// Fetch up to `max` matching messages strictly beyond `after` in scan order
    ///
    /// Returning fewer than `max` messages signals that the snapshot is
    /// exhausted.
    fn next_page(
        &mut self,
        after: Option<TimelineKey>,
        max: usize,
    ) -> Result<Vec<Message>, LogError>;
}

/// Finite, lazily evaluated sequence of query results
///
/// Yields `Err` at most once; the cursor is fused after an error.
pub struct MessageCursor {
    source: Option<Box<dyn PageSource>>,
    buffer: VecDeque<Message>,
    last: Option<TimelineKey>,
    remaining: Option<usize>,
    page_size: usize,
}

impl MessageCursor {
    /// Create a cursor over a page source, honoring an optional result limit
    pub fn new(source: impl PageSource + 'static, limit: Option<usize>) -> Self {
        Self {
            source: Some(Box::new(source)),
            buffer: VecDeque::new(),
            last: None,
            remaining: limit,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// A cursor that yields nothing
    pub fn empty() -> Self {
        Self {
            source: None,
            buffer: VecDeque::new(),
            last: None,
            remaining: Some(0),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the number of messages fetched per page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Drain the cursor into a vector, stopping at the first error
    pub fn collect_messages(self) -> Result<Vec<Message>, LogError> {
        self.collect()
    }

    fn fill(&mut self) -> Result<(), LogError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };

        let want = match self.remaining {
            Some(remaining) => remaining.min(self.page_size),
            None => self.page_size,
        };

        let page = source.next_page(self.last, want)?;
        if page.len() < want {
            self.source = None;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for MessageCursor {
    type Item = Result<Message, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            self.source = None;
            return None;
        }

        if self.buffer.is_empty()
            && let Err(e) = self.fill()
        {
            self.source = None;
            self.remaining = Some(0);
            return Some(Err(e));
        }

        let message = self.buffer.pop_front()?;
        self.last = Some(message.timeline_key());
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(Ok(message))
    }
}

impl fmt::Debug for MessageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCursor")
            .field("buffered", &self.buffer.len())
            .field("last", &self.last)
            .field("remaining", &self.remaining)
            .field("exhausted", &self.source.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LevelId, MessageId};
    use chrono::DateTime;

    /// Serves a fixed, already-ordered list and counts page requests
    struct VecSource {
        messages: Vec<Message>,
        pages: std::rc::Rc<std::cell::Cell<usize>>,
        fail_after: Option<usize>,
    }

    impl PageSource for VecSource {
        fn next_page(
            &mut self,
            after: Option<TimelineKey>,
            max: usize,
        ) -> Result<Vec<Message>, LogError> {
            self.pages.set(self.pages.get() + 1);
            if self.fail_after.is_some_and(|n| self.pages.get() > n) {
                return Err(LogError::storage("gone"));
            }
            Ok(self
                .messages
                .iter()
                .filter(|m| after.is_none_or(|key| m.timeline_key() > key))
                .take(max)
                .cloned()
                .collect())
        }
    }

    fn messages(n: u64) -> Vec<Message> {
        (1..=n)
            .map(|i| Message {
                id: MessageId(i),
                level: LevelId(1),
                timestamp: DateTime::from_timestamp_micros(i as i64 * 10).unwrap(),
                payload: format!("message {}", i),
                source: None,
            })
            .collect()
    }

    fn source(n: u64, fail_after: Option<usize>) -> (VecSource, std::rc::Rc<std::cell::Cell<usize>>) {
        let pages = std::rc::Rc::new(std::cell::Cell::new(0));
        (
            VecSource {
                messages: messages(n),
                pages: pages.clone(),
                fail_after,
            },
            pages,
        )
    }

    #[test]
    fn test_pages_through_everything() {
        let (src, pages) = source(10, None);
        let cursor = MessageCursor::new(src, None).with_page_size(3);
        let all = cursor.collect_messages().unwrap();

        assert_eq!(all.len(), 10);
        assert_eq!(all[0].id, MessageId(1));
        assert_eq!(all[9].id, MessageId(10));
        // 3 + 3 + 3 + 1 (short page ends the scan)
        assert_eq!(pages.get(), 4);
    }

    #[test]
    fn test_limit_stops_early() {
        let (src, pages) = source(100, None);
        let cursor = MessageCursor::new(src, Some(5)).with_page_size(3);
        let first = cursor.collect_messages().unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first[4].id, MessageId(5));
        assert_eq!(pages.get(), 2);
    }

    #[test]
    fn test_is_lazy() {
        let (src, pages) = source(100, None);
        let mut cursor = MessageCursor::new(src, None).with_page_size(10);
        assert_eq!(pages.get(), 0);

        cursor.next().unwrap().unwrap();
        assert_eq!(pages.get(), 1);
    }

    #[test]
    fn test_error_is_yielded_once() {
        let (src, _pages) = source(10, Some(1));
        let mut cursor = MessageCursor::new(src, None).with_page_size(4);

        for _ in 0..4 {
            assert!(cursor.next().unwrap().is_ok());
        }
        assert!(matches!(
            cursor.next(),
            Some(Err(LogError::StorageUnavailable(_)))
        ));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn test_empty_cursor() {
        assert!(MessageCursor::empty().next().is_none());
    }
}
