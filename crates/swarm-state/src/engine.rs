// SPDX-License-Identifier: MIT

//! The State Engine (spec §4.2): authoritative per-agent state, inference
//! from transcript text and runner events, and subscriber fan-out.

use crate::error::StateError;
use crate::inference::infer_from_transcript;
use crate::subscriber::{FnSubscriber, StateChange, Subscriber};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use swarm_core::runner_event::RunnerEventKind;
use swarm_core::{Agent, AgentId, AgentState, Clock, Confidence, EntityType, Event, EventType, StateInfo};
use swarm_storage::{EventLog, StorageError};

/// Maps one observed runner event to a state candidate, per spec §4.2's
/// runner-event table. Returns `None` for events with no direct state
/// signal (`heartbeat`, `output_line`, `swap_account`).
fn candidate_from_runner_event(kind: RunnerEventKind, now: DateTime<Utc>) -> Option<StateInfo> {
    match kind {
        RunnerEventKind::PromptReady => Some(StateInfo::new(AgentState::Idle, Confidence::High, "prompt_ready", now)),
        RunnerEventKind::Busy | RunnerEventKind::InputSent => {
            Some(StateInfo::new(AgentState::Working, Confidence::High, "busy", now))
        }
        RunnerEventKind::Pause | RunnerEventKind::Cooldown => {
            Some(StateInfo::new(AgentState::Paused, Confidence::High, "pause", now))
        }
        RunnerEventKind::Exit => Some(StateInfo::new(AgentState::Stopped, Confidence::High, "exit", now)),
        RunnerEventKind::ControlError => Some(StateInfo::new(AgentState::Error, Confidence::Low, "control_error", now)),
        RunnerEventKind::Heartbeat | RunnerEventKind::OutputLine | RunnerEventKind::SwapAccount => None,
    }
}

/// Merge a transcript-derived and a runner-event-derived candidate per the
/// combination rule: higher confidence wins; ties go to the runner-event
/// candidate; evidence merges; reasons concatenate with `;` when they differ.
fn combine(transcript: Option<StateInfo>, runner: Option<StateInfo>) -> Option<StateInfo> {
    match (transcript, runner) {
        (None, None) => None,
        (Some(t), None) => Some(t),
        (None, Some(r)) => Some(r),
        (Some(t), Some(r)) => {
            let (winner, loser) = if r.confidence >= t.confidence { (r, t) } else { (t, r) };
            let reason =
                if winner.reason == loser.reason { winner.reason.clone() } else { format!("{};{}", winner.reason, loser.reason) };
            let mut evidence = winner.evidence.clone();
            for item in loser.evidence {
                if !evidence.contains(&item) {
                    evidence.push(item);
                }
            }
            Some(StateInfo { reason, evidence, ..winner })
        }
    }
}

/// Owns every agent's authoritative state and drives subscriber fan-out.
pub struct StateEngine<C: Clock> {
    event_log: Arc<dyn EventLog>,
    clock: C,
    agents: Mutex<HashMap<AgentId, Agent>>,
    last_info: Mutex<HashMap<AgentId, StateInfo>>,
    subscribers: Mutex<BTreeMap<String, Box<dyn Subscriber>>>,
}

impl<C: Clock> StateEngine<C> {
    pub fn new(event_log: Arc<dyn EventLog>, clock: C) -> Self {
        Self {
            event_log,
            clock,
            agents: Mutex::new(HashMap::new()),
            last_info: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(BTreeMap::new()),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }

    pub fn register_agent(&self, agent: Agent) {
        self.agents.lock().insert(agent.id, agent);
    }

    pub fn agent(&self, id: AgentId) -> Option<Agent> {
        self.agents.lock().get(&id).cloned()
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        self.agents.lock().values().cloned().collect()
    }

    pub fn set_queue_length(&self, id: AgentId, len: usize) {
        if let Some(agent) = self.agents.lock().get_mut(&id) {
            agent.queue_length = len;
        }
    }

    /// Rebinds an agent record to a different account, e.g. after a
    /// scheduler-driven restart onto a rotated account.
    pub fn set_account(&self, id: AgentId, account_id: Option<swarm_core::AccountId>) {
        if let Some(agent) = self.agents.lock().get_mut(&id) {
            agent.account_id = account_id;
        }
    }

    pub fn subscribe(&self, id: impl Into<String>, subscriber: Box<dyn Subscriber>) -> Result<(), StateError> {
        let id = id.into();
        let mut subs = self.subscribers.lock();
        if subs.contains_key(&id) {
            return Err(StateError::AlreadySubscribed(id));
        }
        subs.insert(id, subscriber);
        Ok(())
    }

    pub fn subscribe_func(
        &self,
        id: impl Into<String>,
        func: impl Fn(&StateChange) + Send + Sync + 'static,
    ) -> Result<(), StateError> {
        self.subscribe(id, Box::new(FnSubscriber(func)))
    }

    /// Idempotent: returns whether a subscriber was actually removed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.subscribers.lock().remove(id).is_some()
    }

    /// Feed a window of recent output text through the transcript parser
    /// and apply the resulting candidate, if any.
    pub fn observe_transcript(&self, agent_id: AgentId, tail: &str) -> Result<Option<StateChange>, StorageError> {
        self.observe(agent_id, infer_from_transcript(tail, self.now()), None)
    }

    /// Apply the state candidate implied by one runner event, if any.
    pub fn observe_runner_event(
        &self,
        agent_id: AgentId,
        kind: RunnerEventKind,
        paused_until: Option<DateTime<Utc>>,
    ) -> Result<Option<StateChange>, StorageError> {
        let candidate = candidate_from_runner_event(kind, self.now());
        self.observe(agent_id, None, candidate.map(|c| (c, paused_until)))
    }

    /// Combine a transcript candidate and a runner-event candidate observed
    /// in the same tick, apply the transition policy, and fan out.
    pub fn observe(
        &self,
        agent_id: AgentId,
        transcript: Option<StateInfo>,
        runner: Option<(StateInfo, Option<DateTime<Utc>>)>,
    ) -> Result<Option<StateChange>, StorageError> {
        let paused_until = runner.as_ref().and_then(|(_, until)| *until);
        let candidate = combine(transcript, runner.map(|(info, _)| info));
        let Some(new_info) = candidate else {
            return Ok(None);
        };

        let unchanged = self.last_info.lock().get(&agent_id).map(|prev| prev.identity_tuple() == new_info.identity_tuple()).unwrap_or(false);
        if unchanged {
            return Ok(None);
        }

        let old_info = self.last_info.lock().insert(agent_id, new_info.clone());

        if let Some(agent) = self.agents.lock().get_mut(&agent_id) {
            agent.state = new_info.state;
            agent.updated_at = new_info.detected_at;
            if new_info.state == AgentState::Paused {
                agent.paused_until = paused_until.or(agent.paused_until);
            }
            if matches!(new_info.state, AgentState::Idle | AgentState::Working) {
                agent.paused_until = None;
            }
        }

        self.event_log.append(
            Event::new(EventType::AgentStateChanged, EntityType::Agent, agent_id.as_str()).with_payload(serde_json::json!({
                "old": old_info.as_ref().map(|i| i.state.to_string()),
                "new": new_info.state.to_string(),
                "confidence": new_info.confidence.to_string(),
                "reason": new_info.reason,
            })),
        )?;

        let change = StateChange { agent_id, old: old_info, new: new_info };
        self.notify(&change);
        Ok(Some(change))
    }

    /// Force a transition driven by something other than transcript or
    /// runner-event inference (scheduler pause/resume). Goes through the
    /// same transition-detection, persistence, and fan-out path as
    /// [`Self::observe`].
    pub fn force_state(
        &self,
        agent_id: AgentId,
        state: AgentState,
        reason: &str,
        paused_until: Option<DateTime<Utc>>,
    ) -> Result<Option<StateChange>, StorageError> {
        let info = StateInfo::new(state, Confidence::High, reason, self.now());
        self.observe(agent_id, None, Some((info, paused_until)))
    }

    fn notify(&self, change: &StateChange) {
        let subscribers = self.subscribers.lock();
        for (id, subscriber) in subscribers.iter() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_state_change(change)));
            if result.is_err() {
                tracing::error!(subscriber_id = %id, agent_id = %change.agent_id, "subscriber panicked on state change");
                let _ = self.event_log.append(
                    Event::new(EventType::SystemError, EntityType::System, "state_engine").with_payload(serde_json::json!({
                        "subscriber_id": id,
                        "agent_id": change.agent_id.as_str(),
                    })),
                );
            }
        }
    }
}
