// SPDX-License-Identifier: MIT

//! Events the Agent Runner emits to its Sink; consumed by the Event Log and
//! the State Engine.

use crate::agent::{AgentId, WorkspaceId};
use chrono::{DateTime, Utc};

/// Discriminant for a [`RunnerEvent`]'s payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerEventKind {
    Heartbeat,
    InputSent,
    OutputLine,
    PromptReady,
    Busy,
    Pause,
    Cooldown,
    SwapAccount,
    Exit,
    ControlError,
}

crate::simple_display! {
    RunnerEventKind {
        Heartbeat => "heartbeat",
        InputSent => "input_sent",
        OutputLine => "output_line",
        PromptReady => "prompt_ready",
        Busy => "busy",
        Pause => "pause",
        Cooldown => "cooldown",
        SwapAccount => "swap_account",
        Exit => "exit",
        ControlError => "control_error",
    }
}

/// One event emitted by the runner's output/control readers and heartbeat timer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunnerEvent {
    pub kind: RunnerEventKind,
    pub timestamp: DateTime<Utc>,
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub data: serde_json::Value,
}

impl RunnerEvent {
    pub fn new(
        kind: RunnerEventKind,
        workspace_id: WorkspaceId,
        agent_id: AgentId,
        now: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self { kind, timestamp: now, workspace_id, agent_id, data }
    }
}
