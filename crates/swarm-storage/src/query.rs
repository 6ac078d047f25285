// SPDX-License-Identifier: MIT

//! Event Log query filter, cursor, and page types.

use chrono::{DateTime, Utc};
use swarm_core::{EntityType, Event, EventId, EventType};

/// Implementation maximum for `limit`, regardless of what the caller asks for.
pub const MAX_QUERY_LIMIT: usize = 1_000;
/// Conservative default applied when the caller omits `limit`.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Filter accepted by [`crate::event_log::EventLog::query`].
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    /// Inclusive lower timestamp bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper timestamp bound.
    pub until: Option<DateTime<Utc>>,
    /// ID of the last event of the previous page; resumption yields strictly
    /// subsequent rows in `(timestamp, id)` order.
    pub cursor: Option<EventId>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT)
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(t) = self.event_type {
            if event.event_type != t {
                return false;
            }
        }
        if let Some(t) = self.entity_type {
            if event.entity_type != t {
                return false;
            }
        }
        if let Some(ref id) = self.entity_id {
            if &event.entity_id != id {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp >= until {
                return false;
            }
        }
        true
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub next_cursor: Option<EventId>,
}
