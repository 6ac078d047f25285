// SPDX-License-Identifier: MIT

//! The append-only Event type and its closed type-tag enumeration.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Monotone, server-assigned event ID. Assigned by the Event Log on append;
/// the pair `(timestamp, id)` is the strict total order used for cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl EventId {
    /// Sentinel used before the store has assigned a real ID.
    pub const UNASSIGNED: EventId = EventId(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

/// What kind of entity an event's `entity_id` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Agent,
    QueueItem,
    Account,
    System,
}

crate::simple_display! {
    EntityType {
        Agent => "agent",
        QueueItem => "queue_item",
        Account => "account",
        System => "system",
    }
}

/// Closed enumeration of event types spanning agent lifecycle, message
/// lifecycle, rate-limit signals, account rotation, and system error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Agent lifecycle (runner + state engine)
    AgentSpawned,
    AgentStateChanged,
    AgentStopped,
    AgentHeartbeat,
    AgentOutputLine,
    AgentPromptReady,
    AgentBusy,
    AgentInputSent,
    AgentPause,
    AgentControlError,
    // Message lifecycle (queue store + scheduler)
    MessageQueued,
    MessageDispatched,
    MessageCompleted,
    MessageFailed,
    // Rate-limit / cooldown signals
    RateLimitDetected,
    CooldownStarted,
    // Account rotation
    AccountRotated,
    // System
    SystemError,
}

crate::simple_display! {
    EventType {
        AgentSpawned => "agent.spawned",
        AgentStateChanged => "agent.state_changed",
        AgentStopped => "agent.stopped",
        AgentHeartbeat => "agent.heartbeat",
        AgentOutputLine => "agent.output_line",
        AgentPromptReady => "agent.prompt_ready",
        AgentBusy => "agent.busy",
        AgentInputSent => "agent.input_sent",
        AgentPause => "agent.pause",
        AgentControlError => "agent.control_error",
        MessageQueued => "message.queued",
        MessageDispatched => "message.dispatched",
        MessageCompleted => "message.completed",
        MessageFailed => "message.failed",
        RateLimitDetected => "rate_limit.detected",
        CooldownStarted => "cooldown.started",
        AccountRotated => "account.rotated",
        SystemError => "system.error",
    }
}

/// One immutable row in the append-only history.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Event {
    /// Build an unassigned event (`id == EventId::UNASSIGNED`, `timestamp` as
    /// given); the Event Log assigns both on `Append` if left at defaults.
    pub fn new(event_type: EventType, entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            id: EventId::UNASSIGNED,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            event_type,
            entity_type,
            entity_id: entity_id.into(),
            payload: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Short one-line summary for structured log fields.
    pub fn log_summary(&self) -> String {
        format!("{}({}:{})", self.event_type, self.entity_type, self.entity_id)
    }
}
