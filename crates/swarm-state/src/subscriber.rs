// SPDX-License-Identifier: MIT

//! Subscriber contract for state-change notifications (spec §4.2).

use swarm_core::{AgentId, StateInfo};

/// One recorded transition, delivered synchronously to every subscriber in
/// subscriber-ID order.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub agent_id: AgentId,
    pub old: Option<StateInfo>,
    pub new: StateInfo,
}

/// Receives state-change notifications. Must not block — the engine calls
/// every subscriber synchronously and in order, never spawning a task per
/// delivery.
pub trait Subscriber: Send + Sync {
    fn on_state_change(&self, change: &StateChange);
}

/// Adapts a plain closure into a [`Subscriber`], for `SubscribeFunc`.
pub struct FnSubscriber<F: Fn(&StateChange) + Send + Sync>(pub F);

impl<F: Fn(&StateChange) + Send + Sync> Subscriber for FnSubscriber<F> {
    fn on_state_change(&self, change: &StateChange) {
        (self.0)(change)
    }
}
