// SPDX-License-Identifier: MIT

//! State inference output shared between the transcript parser and the
//! runner-event observer that feed the state engine's combination rule.

use crate::agent::AgentState;
use chrono::{DateTime, Utc};

/// How sure the inferring component is about a `StateInfo` candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

crate::simple_display! {
    Confidence {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

/// One candidate (or recorded) state for an agent, with its supporting evidence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StateInfo {
    pub state: AgentState,
    pub confidence: Confidence,
    pub reason: String,
    pub detected_at: DateTime<Utc>,
    pub evidence: Vec<String>,
}

impl StateInfo {
    pub fn new(state: AgentState, confidence: Confidence, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { state, confidence, reason: reason.into(), detected_at: now, evidence: Vec::new() }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    /// The `(state, confidence, reason)` tuple the transition policy compares
    /// against the last recorded value.
    pub fn identity_tuple(&self) -> (AgentState, Confidence, &str) {
        (self.state, self.confidence, self.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn confidence_orders_low_medium_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn identity_tuple_reflects_current_fields() {
        let info = StateInfo::new(AgentState::Idle, Confidence::High, "prompt_match", now());
        assert_eq!(info.identity_tuple(), (AgentState::Idle, Confidence::High, "prompt_match"));
    }
}
