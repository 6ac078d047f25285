// SPDX-License-Identifier: MIT

//! One dispatch task (spec §4.4 step 3): dequeue, deliver, and record the
//! outcome. Bounded by the scheduler's semaphore, not by this module.

use crate::binding::{AgentBinding, SendMessageOpts};
use crate::condition;
use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use swarm_core::{AgentId, EntityType, Event, EventType, QueueItemPayload, QueueItemStatus};
use swarm_storage::{EventLog, QueueStore};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    QueueEmpty,
    Completed,
    Failed(String),
    /// A `pause` item completed; the caller (the scheduler) is responsible
    /// for adding `agent_id` to its excluded set.
    Paused(Duration),
    ConditionalRequeued,
}

/// Dequeues and delivers one queue item for `agent_id`. Never busy-loops: a
/// `conditional` item whose condition is not yet met is re-inserted at
/// position 1 and left for the next tick's eligibility pass.
pub async fn dispatch_one(
    agent_id: AgentId,
    queue: &dyn QueueStore,
    binding: &dyn AgentBinding,
    event_log: &dyn EventLog,
    now: DateTime<Utc>,
    after_cooldown_threshold: Duration,
    dispatch_timeout: Duration,
) -> Result<DispatchOutcome, SchedulerError> {
    let item = match queue.dequeue(agent_id, now) {
        Ok(item) => item,
        Err(e) if e.is_control_signal() => return Ok(DispatchOutcome::QueueEmpty),
        Err(e) => return Err(e.into()),
    };

    let _ = event_log.append(
        Event::new(EventType::MessageDispatched, EntityType::QueueItem, item.id.to_string())
            .with_metadata("agent_id", agent_id.to_string()),
    );

    match item.payload.clone() {
        QueueItemPayload::Message { text } => {
            let sent = tokio::time::timeout(
                dispatch_timeout,
                binding.send_message(agent_id, &text, SendMessageOpts { skip_idle_check: false }),
            )
            .await;

            match sent {
                Ok(Ok(())) => {
                    queue.update_status(item.id, QueueItemStatus::Completed, None, now)?;
                    let _ = event_log.append(Event::new(EventType::MessageCompleted, EntityType::QueueItem, item.id.to_string()));
                    Ok(DispatchOutcome::Completed)
                }
                Ok(Err(err)) => {
                    let message = err.to_string();
                    queue.update_status(item.id, QueueItemStatus::Failed, Some(message.clone()), now)?;
                    let _ = event_log.append(
                        Event::new(EventType::MessageFailed, EntityType::QueueItem, item.id.to_string())
                            .with_metadata("error", message.clone()),
                    );
                    Ok(DispatchOutcome::Failed(message))
                }
                Err(_elapsed) => {
                    let message = "dispatch timed out".to_string();
                    queue.update_status(item.id, QueueItemStatus::Failed, Some(message.clone()), now)?;
                    let _ = event_log.append(
                        Event::new(EventType::MessageFailed, EntityType::QueueItem, item.id.to_string())
                            .with_metadata("error", message.clone()),
                    );
                    Ok(DispatchOutcome::Failed(message))
                }
            }
        }
        QueueItemPayload::Pause { duration_seconds, reason } => {
            let duration = Duration::from_secs(duration_seconds);
            binding.pause_agent(agent_id, duration).await?;
            queue.update_status(item.id, QueueItemStatus::Completed, None, now)?;
            let _ = event_log.append(
                Event::new(EventType::MessageCompleted, EntityType::QueueItem, item.id.to_string())
                    .with_metadata("reason", reason),
            );
            Ok(DispatchOutcome::Paused(duration))
        }
        QueueItemPayload::Conditional { condition_type, expression: _, message } => {
            let agent = binding.get_agent(agent_id)?;
            match condition::evaluate(condition_type, &agent, now, after_cooldown_threshold) {
                Ok(true) => {
                    binding.send_message(agent_id, &message, SendMessageOpts { skip_idle_check: true }).await?;
                    queue.update_status(item.id, QueueItemStatus::Completed, None, now)?;
                    let _ = event_log.append(Event::new(EventType::MessageCompleted, EntityType::QueueItem, item.id.to_string()));
                    Ok(DispatchOutcome::Completed)
                }
                Ok(false) => {
                    queue.remove(item.id)?;
                    queue.insert_at(agent_id, 1, item)?;
                    Ok(DispatchOutcome::ConditionalRequeued)
                }
                Err(err) => {
                    let message = err.to_string();
                    queue.update_status(item.id, QueueItemStatus::Failed, Some(message.clone()), now)?;
                    let _ = event_log.append(
                        Event::new(EventType::MessageFailed, EntityType::QueueItem, item.id.to_string())
                            .with_metadata("error", message.clone()),
                    );
                    Ok(DispatchOutcome::Failed(message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{AgentBinding, ListAgentsOpts};
    use async_trait::async_trait;
    use std::sync::Arc;
    use swarm_core::{Account, AccountId, Agent, AgentState, AgentType, ConditionKind, WorkspaceId};
    use swarm_storage::FileEventLog;
    use swarm_storage::FileQueueStore;

    struct StubBinding {
        agent: parking_lot::Mutex<Agent>,
        sent: parking_lot::Mutex<Vec<String>>,
        fail_send: bool,
    }

    #[async_trait]
    impl AgentBinding for StubBinding {
        async fn send_message(&self, _agent_id: AgentId, text: &str, _opts: SendMessageOpts) -> Result<(), SchedulerError> {
            if self.fail_send {
                return Err(SchedulerError::AgentNotFound("boom".into()));
            }
            self.sent.lock().push(text.to_string());
            Ok(())
        }
        async fn pause_agent(&self, _agent_id: AgentId, _duration: Duration) -> Result<(), SchedulerError> {
            Ok(())
        }
        async fn resume_agent(&self, _agent_id: AgentId) -> Result<(), SchedulerError> {
            Ok(())
        }
        async fn restart_agent_with_account(&self, _agent_id: AgentId, account_id: AccountId) -> Result<Account, SchedulerError> {
            Ok(Account::new(swarm_core::Provider::Anthropic, "x", swarm_core::CredentialRef::Literal { secret: account_id.to_string() }))
        }
        fn get_agent(&self, _agent_id: AgentId) -> Result<Agent, SchedulerError> {
            Ok(self.agent.lock().clone())
        }
        fn list_agents(&self, _opts: ListAgentsOpts) -> Vec<Agent> {
            vec![self.agent.lock().clone()]
        }
    }

    fn setup() -> (tempfile::TempDir, FileQueueStore, FileEventLog<swarm_core::FakeClock>, AgentId) {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueueStore::open(dir.path().join("q.json")).unwrap();
        let log = FileEventLog::open(dir.path().join("e.jsonl"), swarm_core::FakeClock::new()).unwrap();
        let agent_id = AgentId::new();
        (dir, queue, log, agent_id)
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[tokio::test]
    async fn empty_queue_yields_queue_empty_outcome() {
        let (_dir, queue, log, agent_id) = setup();
        let agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: false };

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::QueueEmpty);
    }

    #[tokio::test]
    async fn message_dispatch_completes_and_forwards_text() {
        let (_dir, queue, log, agent_id) = setup();
        let mut agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        agent.state = AgentState::Idle;
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: false };
        queue.enqueue(agent_id, vec![QueueItemPayload::Message { text: "hello".into() }], now()).unwrap();

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(binding.sent.lock().as_slice(), ["hello"]);
    }

    #[tokio::test]
    async fn message_send_failure_marks_item_failed() {
        let (_dir, queue, log, agent_id) = setup();
        let agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: true };
        let enqueued = queue.enqueue(agent_id, vec![QueueItemPayload::Message { text: "hi".into() }], now()).unwrap();

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        let items = queue.list(agent_id).unwrap();
        assert_eq!(items.iter().find(|i| i.id == enqueued[0].id).unwrap().status, QueueItemStatus::Failed);
    }

    #[tokio::test]
    async fn conditional_not_met_requeues_at_position_one_with_attempts_unchanged() {
        let (_dir, queue, log, agent_id) = setup();
        let mut agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        agent.state = AgentState::Working;
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: false };
        queue
            .enqueue(
                agent_id,
                vec![QueueItemPayload::Conditional { condition_type: ConditionKind::WhenIdle, expression: None, message: "ok".into() }],
                now(),
            )
            .unwrap();

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::ConditionalRequeued);

        let items = queue.list(agent_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, QueueItemStatus::Pending);
        assert_eq!(items[0].position, 1);
        assert_eq!(items[0].attempts, 0);
    }

    #[tokio::test]
    async fn conditional_met_dispatches_message() {
        let (_dir, queue, log, agent_id) = setup();
        let mut agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        agent.state = AgentState::Idle;
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: false };
        queue
            .enqueue(
                agent_id,
                vec![QueueItemPayload::Conditional { condition_type: ConditionKind::WhenIdle, expression: None, message: "ok".into() }],
                now(),
            )
            .unwrap();

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(binding.sent.lock().as_slice(), ["ok"]);
    }

    #[tokio::test]
    async fn pause_item_completes_and_reports_duration() {
        let (_dir, queue, log, agent_id) = setup();
        let agent = Agent::new(WorkspaceId::new(), AgentType::Generic, "pane:0", now());
        let binding = StubBinding { agent: parking_lot::Mutex::new(agent), sent: parking_lot::Mutex::new(vec![]), fail_send: false };
        queue
            .enqueue(agent_id, vec![QueueItemPayload::Pause { duration_seconds: 5, reason: "cooldown".into() }], now())
            .unwrap();

        let outcome = dispatch_one(agent_id, &queue, &binding, &log, now(), Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Paused(Duration::from_secs(5)));
    }
}
