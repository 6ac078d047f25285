// SPDX-License-Identifier: MIT

//! Transcript-pattern inference (spec §4.2): recent output text to a
//! candidate [`StateInfo`], by keyword match only.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use swarm_core::{AgentState, Confidence, StateInfo};

const ERROR_KEYWORDS: [&str; 4] = ["error", "exception", "panic", "failed"];
const RATE_LIMIT_KEYWORDS: [&str; 4] = ["rate limit", "too many requests", "quota exceeded", "429"];
const APPROVAL_KEYWORDS: [&str; 4] = ["[y/n]", "approve", "confirm", "proceed?"];

#[allow(clippy::expect_used)]
fn retry_after_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"retry after (\d+)\s*(s|m|h)").expect("constant regex pattern is valid"))
}

/// Classify a window of recent output text. Returns `None` on no keyword
/// match, per spec §4.2's "no match ⇒ no update".
pub fn infer_from_transcript(tail: &str, now: DateTime<Utc>) -> Option<StateInfo> {
    let lower = tail.to_lowercase();

    if ERROR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(StateInfo::new(AgentState::Error, Confidence::Medium, "transcript_error_keyword", now));
    }

    if RATE_LIMIT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        let mut info = StateInfo::new(AgentState::RateLimited, Confidence::Medium, "transcript_rate_limit", now);
        if let Some(captures) = retry_after_pattern().captures(&lower) {
            info = info.with_evidence(format!("retry_after={}{}", &captures[1], &captures[2]));
        }
        return Some(info);
    }

    if APPROVAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some(StateInfo::new(AgentState::AwaitingApproval, Confidence::Low, "transcript_approval_prompt", now));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn error_keyword_yields_medium_confidence_error() {
        let info = infer_from_transcript("Traceback: panic in worker", now()).unwrap();
        assert_eq!(info.state, AgentState::Error);
        assert_eq!(info.confidence, Confidence::Medium);
    }

    #[test]
    fn rate_limit_keyword_captures_retry_after_as_evidence() {
        let info = infer_from_transcript("429 Too Many Requests, retry after 30s", now()).unwrap();
        assert_eq!(info.state, AgentState::RateLimited);
        assert!(info.evidence.iter().any(|e| e == "retry_after=30s"));
    }

    #[test]
    fn approval_keyword_yields_low_confidence() {
        let info = infer_from_transcript("Proceed? [y/n]", now()).unwrap();
        assert_eq!(info.state, AgentState::AwaitingApproval);
        assert_eq!(info.confidence, Confidence::Low);
    }

    #[test]
    fn unrecognised_text_yields_no_candidate() {
        assert!(infer_from_transcript("just some normal output", now()).is_none());
    }
}
