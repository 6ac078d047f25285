// SPDX-License-Identifier: MIT

//! Per-agent-type regex sets classifying the output tail as ready, busy,
//! rate-limited, or awaiting approval (spec §4.1/§9).

use regex::Regex;
use swarm_core::AgentType;

/// A compiled classification pass for one agent type.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub prompt_ready: Regex,
    pub busy: Regex,
    pub rate_limit: Regex,
    pub awaiting_approval: Regex,
}

impl PatternSet {
    /// Built-in defaults, one per known agent type plus a generic fallback.
    pub fn for_agent_type(agent_type: AgentType) -> Self {
        match agent_type {
            AgentType::Opencode => Self::new(
                r"(?m)^>\s*$",
                r"(?i)\b(thinking|running|generating)\b",
                r"(?i)rate.?limit|too many requests|429",
                r"(?i)\ballow\b.*\?|\(y/n\)",
            ),
            AgentType::ClaudeCode => Self::new(
                r"(?m)^\s*>\s*$|Human:\s*$",
                r"(?i)\b(esc to interrupt|thinking)\b",
                r"(?i)rate.?limit|usage limit reached|429",
                r"(?i)do you want to proceed|\(y/n\)",
            ),
            AgentType::Codex => Self::new(
                r"(?m)^codex>\s*$",
                r"(?i)\b(working|thinking)\b",
                r"(?i)rate.?limit|429",
                r"(?i)approve this (command|action)|\(y/n\)",
            ),
            AgentType::Gemini => Self::new(
                r"(?m)^>\s*$",
                r"(?i)\b(generating|loading)\b",
                r"(?i)rate.?limit|quota exceeded|429",
                r"(?i)proceed\?|\(y/n\)",
            ),
            AgentType::Generic => Self::generic(),
        }
    }

    fn generic() -> Self {
        Self::new(r"(?m)^\s*[>$#]\s*$", r"(?i)\b(working|running|thinking|loading)\b", r"(?i)rate.?limit|429", r"(?i)\(y/n\)|proceed\?")
    }

    #[allow(clippy::expect_used)]
    fn new(prompt_ready: &str, busy: &str, rate_limit: &str, awaiting_approval: &str) -> Self {
        Self {
            prompt_ready: Regex::new(prompt_ready).expect("built-in pattern is valid regex"),
            busy: Regex::new(busy).expect("built-in pattern is valid regex"),
            rate_limit: Regex::new(rate_limit).expect("built-in pattern is valid regex"),
            awaiting_approval: Regex::new(awaiting_approval).expect("built-in pattern is valid regex"),
        }
    }

    /// Build a pattern set from caller-supplied regex strings, falling back
    /// to the generic defaults for any field left `None`.
    pub fn from_overrides(
        prompt_ready: Option<&str>,
        busy: Option<&str>,
        rate_limit: Option<&str>,
        awaiting_approval: Option<&str>,
    ) -> Result<Self, regex::Error> {
        let base = Self::generic();
        Ok(Self {
            prompt_ready: prompt_ready.map(Regex::new).transpose()?.unwrap_or(base.prompt_ready),
            busy: busy.map(Regex::new).transpose()?.unwrap_or(base.busy),
            rate_limit: rate_limit.map(Regex::new).transpose()?.unwrap_or(base.rate_limit),
            awaiting_approval: awaiting_approval.map(Regex::new).transpose()?.unwrap_or(base.awaiting_approval),
        })
    }
}
