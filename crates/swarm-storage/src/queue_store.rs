// SPDX-License-Identifier: MIT

//! The Queue Store (spec §4.3): per-agent ordered queues with atomic reorder
//! semantics, persisted as a JSON snapshot rather than an append log since
//! items mutate in place.

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use swarm_core::{AgentId, QueueItem, QueueItemId, QueueItemPayload, QueueItemStatus};

pub trait QueueStore: Send + Sync {
    fn enqueue(
        &self,
        agent_id: AgentId,
        payloads: Vec<QueueItemPayload>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, StorageError>;

    fn peek(&self, agent_id: AgentId) -> Result<QueueItem, StorageError>;

    fn dequeue(&self, agent_id: AgentId, now: DateTime<Utc>) -> Result<QueueItem, StorageError>;

    fn list(&self, agent_id: AgentId) -> Result<Vec<QueueItem>, StorageError>;

    fn reorder(&self, agent_id: AgentId, ids: Vec<QueueItemId>) -> Result<(), StorageError>;

    fn insert_at(
        &self,
        agent_id: AgentId,
        position: u32,
        item: QueueItem,
    ) -> Result<QueueItem, StorageError>;

    fn count(&self, agent_id: AgentId) -> Result<usize, StorageError>;

    fn clear(&self, agent_id: AgentId) -> Result<usize, StorageError>;

    fn update_status(
        &self,
        id: QueueItemId,
        status: QueueItemStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, StorageError>;

    fn update_attempts(&self, id: QueueItemId, attempts: u32) -> Result<QueueItem, StorageError>;

    fn remove(&self, id: QueueItemId) -> Result<(), StorageError>;
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    items_by_agent: HashMap<AgentId, Vec<QueueItem>>,
}

struct State {
    items_by_agent: HashMap<AgentId, Vec<QueueItem>>,
    agent_by_item: HashMap<QueueItemId, AgentId>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut agent_by_item = HashMap::new();
        for (agent_id, items) in &snapshot.items_by_agent {
            for item in items {
                agent_by_item.insert(item.id, *agent_id);
            }
        }
        Self { items_by_agent: snapshot.items_by_agent, agent_by_item }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot { items_by_agent: self.items_by_agent.clone() }
    }
}

/// Reassign dense `1..N` positions to the pending items of `items`, in the
/// relative order they already appear, leaving non-pending items untouched.
fn renumber_pending(items: &mut [QueueItem]) {
    let mut next_position = 1u32;
    let mut order: Vec<usize> = (0..items.len())
        .filter(|&i| items[i].status == QueueItemStatus::Pending)
        .collect();
    order.sort_by_key(|&i| items[i].position);
    for i in order {
        items[i].position = next_position;
        next_position += 1;
    }
}

/// File-backed Queue Store: an in-memory index persisted as a single JSON
/// snapshot, rewritten atomically (write-temp, then rename) after every
/// mutating operation.
pub struct FileQueueStore {
    state: RwLock<State>,
    path: PathBuf,
}

impl FileQueueStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(StorageError::Io(e)),
        };
        Ok(Self { state: RwLock::new(State::from_snapshot(snapshot)), path })
    }

    fn persist(&self, state: &State) -> Result<(), StorageError> {
        let snapshot = state.to_snapshot();
        let contents = serde_json::to_string_pretty(&snapshot)?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl QueueStore for FileQueueStore {
    fn enqueue(
        &self,
        agent_id: AgentId,
        payloads: Vec<QueueItemPayload>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, StorageError> {
        let mut state = self.state.write();
        let items = state.items_by_agent.entry(agent_id).or_default();
        let mut base = items.iter().filter(|i| i.status == QueueItemStatus::Pending).count() as u32;

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let mut item = QueueItem::new(agent_id, payload, now);
            base += 1;
            item.position = base;
            items.push(item.clone());
            created.push(item);
        }
        for item in &created {
            state.agent_by_item.insert(item.id, agent_id);
        }
        self.persist(&state)?;
        Ok(created)
    }

    fn peek(&self, agent_id: AgentId) -> Result<QueueItem, StorageError> {
        let state = self.state.read();
        state
            .items_by_agent
            .get(&agent_id)
            .into_iter()
            .flatten()
            .find(|i| i.status == QueueItemStatus::Pending && i.position == 1)
            .cloned()
            .ok_or(StorageError::Empty)
    }

    fn dequeue(&self, agent_id: AgentId, now: DateTime<Utc>) -> Result<QueueItem, StorageError> {
        let mut state = self.state.write();
        let items = state
            .items_by_agent
            .get_mut(&agent_id)
            .ok_or(StorageError::Empty)?;

        let idx = items
            .iter()
            .position(|i| i.status == QueueItemStatus::Pending && i.position == 1)
            .ok_or(StorageError::Empty)?;

        items[idx].status = QueueItemStatus::Dispatched;
        items[idx].dispatched_at = Some(now);
        let dispatched = items[idx].clone();
        renumber_pending(items);
        self.persist(&state)?;
        Ok(dispatched)
    }

    fn list(&self, agent_id: AgentId) -> Result<Vec<QueueItem>, StorageError> {
        let state = self.state.read();
        let mut items: Vec<QueueItem> =
            state.items_by_agent.get(&agent_id).cloned().unwrap_or_default();
        items.sort_by_key(|i| i.position);
        Ok(items)
    }

    fn reorder(&self, agent_id: AgentId, ids: Vec<QueueItemId>) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let items = state.items_by_agent.entry(agent_id).or_default();

        let mut current_pending: Vec<QueueItemId> = items
            .iter()
            .filter(|i| i.status == QueueItemStatus::Pending)
            .map(|i| i.id)
            .collect();
        current_pending.sort_by_key(|id| id.to_string());
        let mut requested = ids.clone();
        requested.sort_by_key(|id| id.to_string());
        if current_pending != requested {
            return Err(StorageError::Conflict(
                "reorder list does not match the current pending set".into(),
            ));
        }

        for (idx, id) in ids.iter().enumerate() {
            if let Some(item) = items.iter_mut().find(|i| &i.id == id) {
                item.position = idx as u32 + 1;
            }
        }
        self.persist(&state)?;
        Ok(())
    }

    fn insert_at(
        &self,
        agent_id: AgentId,
        position: u32,
        mut item: QueueItem,
    ) -> Result<QueueItem, StorageError> {
        let mut state = self.state.write();
        let items = state.items_by_agent.entry(agent_id).or_default();
        let pending_count = items.iter().filter(|i| i.status == QueueItemStatus::Pending).count() as u32;

        if position < 1 || position > pending_count + 1 {
            return Err(StorageError::Invalid(format!(
                "position {position} out of range 1..={}",
                pending_count + 1
            )));
        }

        for existing in items.iter_mut() {
            if existing.status == QueueItemStatus::Pending && existing.position >= position {
                existing.position += 1;
            }
        }
        item.agent_id = agent_id;
        item.position = position;
        item.status = QueueItemStatus::Pending;
        item.dispatched_at = None;
        items.push(item.clone());
        state.agent_by_item.insert(item.id, agent_id);
        self.persist(&state)?;
        Ok(item)
    }

    fn count(&self, agent_id: AgentId) -> Result<usize, StorageError> {
        let state = self.state.read();
        Ok(state
            .items_by_agent
            .get(&agent_id)
            .map(|items| items.iter().filter(|i| i.status == QueueItemStatus::Pending).count())
            .unwrap_or(0))
    }

    fn clear(&self, agent_id: AgentId) -> Result<usize, StorageError> {
        let mut state = self.state.write();
        let Some(items) = state.items_by_agent.get_mut(&agent_id) else {
            return Ok(0);
        };
        let removed_ids: Vec<QueueItemId> = items
            .iter()
            .filter(|i| i.status == QueueItemStatus::Pending)
            .map(|i| i.id)
            .collect();
        items.retain(|i| i.status != QueueItemStatus::Pending);
        for id in &removed_ids {
            state.agent_by_item.remove(id);
        }
        let count = removed_ids.len();
        self.persist(&state)?;
        Ok(count)
    }

    fn update_status(
        &self,
        id: QueueItemId,
        status: QueueItemStatus,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, StorageError> {
        let mut state = self.state.write();
        let agent_id = *state
            .agent_by_item
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        let items = state
            .items_by_agent
            .get_mut(&agent_id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        item.status = status;
        item.error_message = error_message;
        if status.is_terminal() {
            item.completed_at = Some(now);
        }
        let updated = item.clone();
        self.persist(&state)?;
        Ok(updated)
    }

    fn update_attempts(&self, id: QueueItemId, attempts: u32) -> Result<QueueItem, StorageError> {
        let mut state = self.state.write();
        let agent_id = *state
            .agent_by_item
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        let items = state
            .items_by_agent
            .get_mut(&agent_id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        item.attempts = attempts;
        let updated = item.clone();
        self.persist(&state)?;
        Ok(updated)
    }

    fn remove(&self, id: QueueItemId) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let agent_id = state
            .agent_by_item
            .remove(&id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        if let Some(items) = state.items_by_agent.get_mut(&agent_id) {
            items.retain(|i| i.id != id);
        }
        self.persist(&state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn store() -> (tempfile::TempDir, FileQueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileQueueStore::open(dir.path().join("queue.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn enqueue_assigns_dense_contiguous_positions() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        let items = store
            .enqueue(
                agent,
                vec![
                    QueueItemPayload::Message { text: "a".into() },
                    QueueItemPayload::Message { text: "b".into() },
                ],
                now(),
            )
            .unwrap();
        assert_eq!(items[0].position, 1);
        assert_eq!(items[1].position, 2);
    }

    #[test]
    fn dequeue_is_inverse_of_enqueue() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        let enqueued = store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "hello".into() }], now())
            .unwrap();
        let dequeued = store.dequeue(agent, now()).unwrap();
        assert_eq!(dequeued.id, enqueued[0].id);
        assert_eq!(dequeued.status, QueueItemStatus::Dispatched);
        assert!(dequeued.dispatched_at.is_some());
    }

    #[test]
    fn peek_on_empty_queue_fails_empty() {
        let (_dir, store) = store();
        assert!(matches!(store.peek(AgentId::new()), Err(StorageError::Empty)));
    }

    #[test]
    fn dequeue_decrements_remaining_positions() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        store
            .enqueue(
                agent,
                vec![
                    QueueItemPayload::Message { text: "a".into() },
                    QueueItemPayload::Message { text: "b".into() },
                    QueueItemPayload::Message { text: "c".into() },
                ],
                now(),
            )
            .unwrap();
        store.dequeue(agent, now()).unwrap();
        let remaining = store.list(agent).unwrap();
        let pending: Vec<_> = remaining.iter().filter(|i| i.status == QueueItemStatus::Pending).collect();
        assert_eq!(pending[0].position, 1);
        assert_eq!(pending[1].position, 2);
    }

    #[test]
    fn reorder_by_current_order_is_identity() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        let items = store
            .enqueue(
                agent,
                vec![
                    QueueItemPayload::Message { text: "a".into() },
                    QueueItemPayload::Message { text: "b".into() },
                ],
                now(),
            )
            .unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        store.reorder(agent, ids).unwrap();
        let after = store.list(agent).unwrap();
        assert_eq!(after[0].position, 1);
        assert_eq!(after[1].position, 2);
    }

    #[test]
    fn reorder_with_stale_set_fails_conflict() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "a".into() }], now())
            .unwrap();
        let stale_id = QueueItemId::new();
        assert!(matches!(
            store.reorder(agent, vec![stale_id]),
            Err(StorageError::Conflict(_))
        ));
    }

    #[test]
    fn insert_at_shifts_existing_positions() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        store
            .enqueue(
                agent,
                vec![
                    QueueItemPayload::Message { text: "a".into() },
                    QueueItemPayload::Message { text: "b".into() },
                ],
                now(),
            )
            .unwrap();
        let new_item = QueueItem::new(agent, QueueItemPayload::Message { text: "front".into() }, now());
        store.insert_at(agent, 1, new_item).unwrap();
        let items = store.list(agent).unwrap();
        let pending: Vec<_> = items.iter().filter(|i| i.status == QueueItemStatus::Pending).collect();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].payload, QueueItemPayload::Message { text: "front".into() });
        assert_eq!(pending[0].position, 1);
        assert_eq!(pending[2].position, 3);
    }

    #[test]
    fn clear_removes_only_pending_items() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "a".into() }], now())
            .unwrap();
        store.dequeue(agent, now()).unwrap();
        store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "b".into() }], now())
            .unwrap();
        let removed = store.clear(agent).unwrap();
        assert_eq!(removed, 1);
        let remaining = store.list(agent).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, QueueItemStatus::Dispatched);
    }

    #[test]
    fn update_status_sets_completed_at_only_on_terminal_status() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        let items = store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "a".into() }], now())
            .unwrap();
        let updated = store
            .update_status(items[0].id, QueueItemStatus::Completed, None, now())
            .unwrap();
        assert!(updated.completed_at.is_some());
    }

    #[test]
    fn update_status_on_unknown_id_fails_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.update_status(QueueItemId::new(), QueueItemStatus::Completed, None, now()),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn remove_hard_deletes_the_item() {
        let (_dir, store) = store();
        let agent = AgentId::new();
        let items = store
            .enqueue(agent, vec![QueueItemPayload::Message { text: "a".into() }], now())
            .unwrap();
        store.remove(items[0].id).unwrap();
        assert_eq!(store.list(agent).unwrap().len(), 0);
    }

    proptest::proptest! {
        #[test]
        fn pending_positions_are_always_a_dense_permutation(
            ops in proptest::collection::vec(0u8..4, 1..40)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = FileQueueStore::open(dir.path().join("q.json")).unwrap();
            let agent = AgentId::new();

            for op in ops {
                match op {
                    0 => { let _ = store.enqueue(agent, vec![QueueItemPayload::Message { text: "x".into() }], now()); }
                    1 => { let _ = store.dequeue(agent, now()); }
                    2 => {
                        let pending: Vec<_> = store.list(agent).unwrap().into_iter()
                            .filter(|i| i.status == QueueItemStatus::Pending).map(|i| i.id).collect();
                        let _ = store.reorder(agent, pending);
                    }
                    _ => {
                        let item = QueueItem::new(agent, QueueItemPayload::Message { text: "y".into() }, now());
                        let pending_count = store.count(agent).unwrap() as u32;
                        let _ = store.insert_at(agent, (pending_count + 1).max(1), item);
                    }
                }

                let items = store.list(agent).unwrap();
                let mut positions: Vec<u32> = items
                    .iter()
                    .filter(|i| i.status == QueueItemStatus::Pending)
                    .map(|i| i.position)
                    .collect();
                positions.sort_unstable();
                let expected: Vec<u32> = (1..=positions.len() as u32).collect();
                proptest::prop_assert_eq!(positions, expected);
            }
        }
    }

    #[test]
    fn snapshot_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        let agent = AgentId::new();
        {
            let store = FileQueueStore::open(&path).unwrap();
            store
                .enqueue(agent, vec![QueueItemPayload::Message { text: "a".into() }], now())
                .unwrap();
        }
        let store = FileQueueStore::open(&path).unwrap();
        assert_eq!(store.count(agent).unwrap(), 1);
    }
}
