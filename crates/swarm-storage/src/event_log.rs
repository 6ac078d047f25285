// SPDX-License-Identifier: MIT

//! The Event Log (spec §4.6): durable, ordered, queryable history.

use crate::error::StorageError;
use crate::query::{EventFilter, EventPage};
use crate::wal::Wal;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use swarm_core::{Clock, EntityType, Event, EventId};

/// Operations the Event Log exposes.
///
/// `append`/`get`/`query`/`list_by_entity` correspond directly to the four
/// operations in spec §4.6; there is no separate transactional `AppendInTx`
/// here because this implementation's single writer lock already makes
/// `append` atomic.
pub trait EventLog: Send + Sync {
    fn append(&self, event: Event) -> Result<Event, StorageError>;
    fn get(&self, id: EventId) -> Result<Event, StorageError>;
    fn query(&self, filter: EventFilter) -> Result<EventPage, StorageError>;
    fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError>;
}

/// File-backed Event Log: a [`Wal`] of [`Event`] plus an in-memory index
/// rebuilt by replaying the file on open.
pub struct FileEventLog<C: Clock> {
    wal: Mutex<Wal<Event>>,
    events: RwLock<Vec<Event>>,
    clock: C,
}

impl<C: Clock> FileEventLog<C> {
    pub fn open(path: impl AsRef<Path>, clock: C) -> Result<Self, StorageError> {
        let wal: Wal<Event> = Wal::open(path)?;
        let events = wal.replay()?.into_iter().map(|entry| entry.value).collect();
        Ok(Self { wal: Mutex::new(wal), events: RwLock::new(events), clock })
    }
}

impl<C: Clock> EventLog for FileEventLog<C> {
    fn append(&self, mut event: Event) -> Result<Event, StorageError> {
        if event.entity_id.is_empty() {
            return Err(StorageError::Invalid("entity_id must be present".into()));
        }

        if event.timestamp == chrono::DateTime::<chrono::Utc>::UNIX_EPOCH {
            let epoch_ms = self.clock.epoch_ms();
            event.timestamp = chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
                .unwrap_or_else(chrono::Utc::now);
        }

        let mut wal = self.wal.lock();
        let seq = wal.append(&event)?;
        event.id = EventId(seq);

        self.events.write().push(event.clone());
        tracing::debug!(event = %event.log_summary(), seq, "event appended");
        Ok(event)
    }

    fn get(&self, id: EventId) -> Result<Event, StorageError> {
        self.events
            .read()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("event {id}")))
    }

    fn query(&self, filter: EventFilter) -> Result<EventPage, StorageError> {
        let limit = filter.effective_limit();
        let events = self.events.read();

        let mut matching: Vec<&Event> = events
            .iter()
            .filter(|e| filter.matches(e))
            .filter(|e| match filter.cursor {
                Some(cursor) => e.id > cursor,
                None => true,
            })
            .collect();
        matching.sort_by_key(|e| (e.timestamp, e.id));

        let has_more = matching.len() > limit;
        matching.truncate(limit);
        let next_cursor = if has_more { matching.last().map(|e| e.id) } else { None };

        Ok(EventPage { events: matching.into_iter().cloned().collect(), next_cursor })
    }

    fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let page = self.query(EventFilter {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.to_string()),
            limit: Some(limit),
            ..Default::default()
        })?;
        Ok(page.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{EventType, FakeClock};

    fn log() -> (tempfile::TempDir, FileEventLog<FakeClock>) {
        let dir = tempfile::tempdir().unwrap();
        let log = FileEventLog::open(dir.path().join("events.jsonl"), FakeClock::new()).unwrap();
        (dir, log)
    }

    #[test]
    fn append_assigns_id_and_timestamp() {
        let (_dir, log) = log();
        let event = Event::new(EventType::MessageQueued, EntityType::QueueItem, "qit-1");
        let appended = log.append(event).unwrap();
        assert!(appended.id.is_assigned());
        assert_ne!(appended.timestamp, chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
    }

    #[test]
    fn append_rejects_missing_entity_id() {
        let (_dir, log) = log();
        let event = Event::new(EventType::MessageQueued, EntityType::QueueItem, "");
        assert!(matches!(log.append(event), Err(StorageError::Invalid(_))));
    }

    #[test]
    fn get_unknown_id_fails_not_found() {
        let (_dir, log) = log();
        assert!(matches!(log.get(EventId(999)), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn query_respects_cursor_and_ordering() {
        let (_dir, log) = log();
        let first = log.append(Event::new(EventType::MessageQueued, EntityType::QueueItem, "a")).unwrap();
        let second = log.append(Event::new(EventType::MessageQueued, EntityType::QueueItem, "b")).unwrap();

        let page = log.query(EventFilter::default()).unwrap();
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[0].id, first.id);
        assert_eq!(page.events[1].id, second.id);

        let resumed = log.query(EventFilter { cursor: Some(first.id), ..Default::default() }).unwrap();
        assert_eq!(resumed.events.len(), 1);
        assert_eq!(resumed.events[0].id, second.id);
    }

    #[test]
    fn query_sets_next_cursor_when_more_rows_exist() {
        let (_dir, log) = log();
        for i in 0..5 {
            log.append(Event::new(EventType::MessageQueued, EntityType::QueueItem, format!("q{i}"))).unwrap();
        }
        let page = log.query(EventFilter { limit: Some(2), ..Default::default() }).unwrap();
        assert_eq!(page.events.len(), 2);
        assert!(page.next_cursor.is_some());
    }

    proptest::proptest! {
        #[test]
        fn appended_events_form_a_strict_total_order(count in 1usize..30) {
            let dir = tempfile::tempdir().unwrap();
            let log = FileEventLog::open(dir.path().join("e.jsonl"), FakeClock::new()).unwrap();

            let mut appended = Vec::new();
            for i in 0..count {
                let event = log
                    .append(Event::new(EventType::MessageQueued, EntityType::QueueItem, format!("q{i}")))
                    .unwrap();
                appended.push(event);
            }

            for pair in appended.windows(2) {
                proptest::prop_assert!((pair[0].timestamp, pair[0].id) < (pair[1].timestamp, pair[1].id));
            }
        }
    }

    #[test]
    fn replay_after_reopen_preserves_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let log = FileEventLog::open(&path, FakeClock::new()).unwrap();
            log.append(Event::new(EventType::AgentSpawned, EntityType::Agent, "agt-1")).unwrap();
        }
        let log = FileEventLog::open(&path, FakeClock::new()).unwrap();
        let page = log.query(EventFilter::default()).unwrap();
        assert_eq!(page.events.len(), 1);
    }
}
