// SPDX-License-Identifier: MIT

//! Conditional queue-item evaluation (spec §4.4).

use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use swarm_core::{Agent, AgentState, ConditionKind};

/// Evaluate one condition tag against an agent's current record.
///
/// `after_cooldown_threshold` is the minimum idle time (`now -
/// agent.last_activity`) for `after_cooldown` to hold; `custom_expression`
/// is unimplemented and always fails.
pub fn evaluate(
    condition: ConditionKind,
    agent: &Agent,
    now: DateTime<Utc>,
    after_cooldown_threshold: Duration,
) -> Result<bool, SchedulerError> {
    match condition {
        ConditionKind::WhenIdle => Ok(agent.state == AgentState::Idle),
        ConditionKind::AfterCooldown => {
            let threshold = chrono::Duration::from_std(after_cooldown_threshold).unwrap_or_default();
            Ok(match agent.last_activity {
                Some(last) => now - last >= threshold,
                None => true,
            })
        }
        ConditionKind::AfterPrevious => Ok(true),
        ConditionKind::CustomExpression => Err(SchedulerError::NotImplemented),
    }
}
