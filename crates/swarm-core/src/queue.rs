// SPDX-License-Identifier: MIT

//! Queue item kinds, statuses, and the record type the Queue Store persists.

use crate::agent::AgentId;
use crate::define_id;
use chrono::{DateTime, Utc};

define_id! {
    /// Identifies one scheduled unit of work for a single agent.
    pub struct QueueItemId("qit-");
}

/// A condition tag for a `conditional` queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    WhenIdle,
    AfterCooldown,
    AfterPrevious,
    CustomExpression,
}

crate::simple_display! {
    ConditionKind {
        WhenIdle => "when_idle",
        AfterCooldown => "after_cooldown",
        AfterPrevious => "after_previous",
        CustomExpression => "custom_expression",
    }
}

/// Kind-specific payload of a queue item.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueItemPayload {
    Message { text: String },
    Pause { duration_seconds: u64, reason: String },
    Conditional { condition_type: ConditionKind, expression: Option<String>, message: String },
}

impl QueueItemPayload {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Pause { .. } => "pause",
            Self::Conditional { .. } => "conditional",
        }
    }
}

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Dispatched,
    Completed,
    Failed,
}

crate::simple_display! {
    QueueItemStatus {
        Pending => "pending",
        Dispatched => "dispatched",
        Completed => "completed",
        Failed => "failed",
    }
}

impl QueueItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One unit of scheduled work for a single agent.
///
/// Invariants (enforced by the Queue Store, not by this type alone):
/// within an agent, the positions of `pending` items form a dense `1..N`
/// sequence; `dispatched_at` is set iff status advanced past `pending`;
/// `completed_at` is set iff status is terminal.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub agent_id: AgentId,
    pub position: u32,
    pub status: QueueItemStatus,
    pub payload: QueueItemPayload,
    pub attempts: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(agent_id: AgentId, payload: QueueItemPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: QueueItemId::new(),
            agent_id,
            position: 0,
            status: QueueItemStatus::Pending,
            payload,
            attempts: 0,
            error_message: None,
            created_at: now,
            dispatched_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn new_item_is_pending_at_position_zero() {
        let item = QueueItem::new(
            AgentId::new(),
            QueueItemPayload::Message { text: "hi".into() },
            now(),
        );
        assert_eq!(item.status, QueueItemStatus::Pending);
        assert_eq!(item.position, 0);
        assert!(item.dispatched_at.is_none());
    }

    #[test]
    fn terminal_statuses_are_completed_and_failed_only() {
        assert!(QueueItemStatus::Completed.is_terminal());
        assert!(QueueItemStatus::Failed.is_terminal());
        assert!(!QueueItemStatus::Pending.is_terminal());
        assert!(!QueueItemStatus::Dispatched.is_terminal());
    }
}
