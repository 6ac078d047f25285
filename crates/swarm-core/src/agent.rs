// SPDX-License-Identifier: MIT

//! Agent identity, type, and lifecycle state.

use crate::account::AccountId;
use crate::define_id;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

define_id! {
    /// Identifies one long-running wrapped agent process.
    pub struct AgentId("agt-");
}

define_id! {
    /// Identifies the workspace an agent operates in.
    pub struct WorkspaceId("wks-");
}

/// Which interactive coding-agent CLI this agent wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Opencode,
    ClaudeCode,
    Codex,
    Gemini,
    Generic,
}

crate::simple_display! {
    AgentType {
        Opencode => "opencode",
        ClaudeCode => "claude-code",
        Codex => "codex",
        Gemini => "gemini",
        Generic => "generic",
    }
}

/// Authoritative lifecycle state of an agent, as maintained by the state engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Starting,
    Idle,
    Working,
    AwaitingApproval,
    Paused,
    RateLimited,
    Stopped,
    Error,
}

crate::simple_display! {
    AgentState {
        Starting => "starting",
        Idle => "idle",
        Working => "working",
        AwaitingApproval => "awaiting_approval",
        Paused => "paused",
        RateLimited => "rate_limited",
        Stopped => "stopped",
        Error => "error",
    }
}

/// Free-form metadata carried on an agent record: environment variables, the
/// model tag, and the command used to start it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgentMetadata {
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub start_command: Vec<String>,
}

/// One long-running interactive agent process wrapped by the system.
///
/// Invariant: `state == AgentState::Paused` iff `paused_until` is in the future.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub workspace_id: WorkspaceId,
    pub agent_type: AgentType,
    pub state: AgentState,
    pub account_id: Option<AccountId>,
    /// Opaque identifier naming where the process runs (tmux pane, daemon handle, ...).
    pub pane_target: String,
    pub queue_length: usize,
    pub paused_until: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: AgentMetadata,
}

impl Agent {
    pub fn new(
        workspace_id: WorkspaceId,
        agent_type: AgentType,
        pane_target: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            workspace_id,
            agent_type,
            state: AgentState::Starting,
            account_id: None,
            pane_target: pane_target.into(),
            queue_length: 0,
            paused_until: None,
            last_activity: None,
            created_at: now,
            updated_at: now,
            metadata: AgentMetadata::default(),
        }
    }

    /// Whether this agent is currently paused, per the `state`/`paused_until` invariant.
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        matches!(self.paused_until, Some(until) if until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn new_agent_starts_in_starting_state_with_empty_queue() {
        let agent = Agent::new(WorkspaceId::new(), AgentType::ClaudeCode, "pane:0", now());
        assert_eq!(agent.state, AgentState::Starting);
        assert_eq!(agent.queue_length, 0);
        assert!(agent.account_id.is_none());
    }

    #[test]
    fn is_paused_tracks_paused_until_in_the_future() {
        let mut agent = Agent::new(WorkspaceId::new(), AgentType::Codex, "pane:1", now());
        assert!(!agent.is_paused(now()));
        agent.paused_until = Some(now() + chrono::Duration::seconds(5));
        assert!(agent.is_paused(now()));
        assert!(!agent.is_paused(now() + chrono::Duration::seconds(6)));
    }
}
