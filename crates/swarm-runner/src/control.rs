// SPDX-License-Identifier: MIT

//! Control-channel line parsing (spec §4.1): each non-blank line is either a
//! JSON object with a `type` field (a control command) or free text
//! forwarded verbatim as input.

use chrono::{DateTime, Utc};
use std::time::Duration;
use swarm_core::AccountId;

/// A parsed control-channel line.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SendInput(String),
    Pause { duration: Duration },
    Cooldown { until: DateTime<Utc> },
    SwapAccount { account_id: AccountId },
    /// Empty `send_message`/`send`, or a line this parser could not classify.
    Error { raw: String },
}

#[derive(serde::Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    until: Option<String>,
    #[serde(default)]
    account_id: Option<String>,
}

/// Parse one line from the control channel. `now` resolves a `pause`'s
/// relative `duration` against the caller's clock is left to the runner;
/// this function only extracts the parsed duration/instant.
pub fn parse_control_line(line: &str) -> ControlCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ControlCommand::Error { raw: line.to_string() };
    }

    let Ok(raw) = serde_json::from_str::<RawCommand>(trimmed) else {
        return ControlCommand::SendInput(line.to_string());
    };

    match raw.kind.as_str() {
        "send_message" | "send" => {
            let text = raw.text.or(raw.message).unwrap_or_default();
            if text.is_empty() {
                ControlCommand::Error { raw: line.to_string() }
            } else {
                ControlCommand::SendInput(text)
            }
        }
        "pause" => match raw.duration.as_deref().and_then(swarm_core::duration::parse_duration) {
            Some(duration) => ControlCommand::Pause { duration },
            None => ControlCommand::Error { raw: line.to_string() },
        },
        "cooldown" => {
            let until = raw
                .until
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| raw.duration.as_deref().and_then(swarm_core::duration::parse_duration).map(|d| Utc::now() + chrono::Duration::from_std(d).unwrap_or_default()));
            match until {
                Some(until) => ControlCommand::Cooldown { until },
                None => ControlCommand::Error { raw: line.to_string() },
            }
        }
        "swap_account" => match raw.account_id.as_deref() {
            Some(id) if !id.is_empty() => ControlCommand::SwapAccount { account_id: AccountId::from(id) },
            _ => ControlCommand::Error { raw: line.to_string() },
        },
        _ => ControlCommand::Error { raw: line.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_line_is_forwarded_as_send_input() {
        assert_eq!(parse_control_line("hello there"), ControlCommand::SendInput("hello there".into()));
    }

    #[test]
    fn send_message_extracts_text_field() {
        let cmd = parse_control_line(r#"{"type":"send_message","text":"go"}"#);
        assert_eq!(cmd, ControlCommand::SendInput("go".into()));
    }

    #[test]
    fn send_with_empty_text_is_control_error() {
        let cmd = parse_control_line(r#"{"type":"send","message":""}"#);
        assert!(matches!(cmd, ControlCommand::Error { .. }));
    }

    #[test]
    fn pause_parses_duration() {
        let cmd = parse_control_line(r#"{"type":"pause","duration":"30s"}"#);
        assert_eq!(cmd, ControlCommand::Pause { duration: Duration::from_secs(30) });
    }

    #[test]
    fn cooldown_parses_rfc3339_until() {
        let cmd = parse_control_line(r#"{"type":"cooldown","until":"2026-01-01T00:00:00Z"}"#);
        assert!(matches!(cmd, ControlCommand::Cooldown { .. }));
    }

    #[test]
    fn swap_account_extracts_account_id() {
        let cmd = parse_control_line(r#"{"type":"swap_account","account_id":"acc-1"}"#);
        assert_eq!(cmd, ControlCommand::SwapAccount { account_id: AccountId::from("acc-1") });
    }

    #[test]
    fn unknown_type_is_control_error() {
        let cmd = parse_control_line(r#"{"type":"frobnicate"}"#);
        assert!(matches!(cmd, ControlCommand::Error { .. }));
    }
}
