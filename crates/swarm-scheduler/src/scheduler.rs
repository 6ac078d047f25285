// SPDX-License-Identifier: MIT

//! The Scheduler (spec §4.4): the single main loop that drives dispatch.

use crate::binding::AgentBinding;
use crate::config::SchedulerConfig;
use crate::dispatch::{self, DispatchOutcome};
use crate::error::SchedulerError;
use crate::stats::{DispatchStats, StatsRecorder};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swarm_core::{Agent, AgentId, AgentState, Clock};
use swarm_storage::EventLog;
use swarm_storage::QueueStore;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

const SCHEDULE_CHANNEL_DEPTH: usize = 256;

/// Drives dispatch: one tick loop, a bounded dispatch semaphore, and a
/// channel for `ScheduleNow` requests raised by the state engine (on any
/// transition to idle) or by an external caller.
pub struct Scheduler<C: Clock> {
    config: SchedulerConfig,
    clock: C,
    state: Arc<swarm_state::StateEngine<C>>,
    queue: Arc<dyn QueueStore>,
    event_log: Arc<dyn EventLog>,
    binding: Arc<dyn AgentBinding>,
    excluded: Mutex<HashSet<AgentId>>,
    paused: AtomicBool,
    running: AtomicBool,
    stats: StatsRecorder,
    schedule_tx: mpsc::Sender<AgentId>,
    schedule_rx: Mutex<Option<mpsc::Receiver<AgentId>>>,
    cancel: Mutex<Option<CancellationToken>>,
    join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<C: Clock + 'static> Scheduler<C> {
    /// Builds the scheduler and subscribes it to the state engine as
    /// `"scheduler"`. Fails if that subscriber ID is already registered.
    pub fn new(
        config: SchedulerConfig,
        clock: C,
        state: Arc<swarm_state::StateEngine<C>>,
        queue: Arc<dyn QueueStore>,
        event_log: Arc<dyn EventLog>,
        binding: Arc<dyn AgentBinding>,
    ) -> Result<Arc<Self>, swarm_state::StateError> {
        let (schedule_tx, schedule_rx) = mpsc::channel(SCHEDULE_CHANNEL_DEPTH);

        let scheduler = Arc::new(Self {
            config,
            clock,
            state: state.clone(),
            queue,
            event_log,
            binding,
            excluded: Mutex::new(HashSet::new()),
            paused: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stats: StatsRecorder::new(),
            schedule_tx: schedule_tx.clone(),
            schedule_rx: Mutex::new(Some(schedule_rx)),
            cancel: Mutex::new(None),
            join: Mutex::new(None),
        });

        state.subscribe_func("scheduler", move |change| {
            if change.new.state == AgentState::Idle {
                if schedule_tx.try_send(change.agent_id).is_err() {
                    tracing::warn!(agent_id = %change.agent_id, "schedule-now channel full, next tick will cover it");
                }
            }
        })?;

        Ok(scheduler)
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }

    /// Transitions not-running to running. Idempotency error on double start.
    pub fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.stats.mark_started(self.now());
        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_loop(cancel).await });
        *self.join.lock() = Some(handle);
        Ok(())
    }

    /// Cancels the tick loop and awaits all in-flight dispatches.
    pub async fn stop(self: &Arc<Self>) -> Result<(), SchedulerError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Global soft-stop: running continues, no dispatches are submitted.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Adds `agent_id` to the excluded set. Orthogonal to `paused_until`,
    /// which only the queue-pause-item / control-channel / auto-resume path
    /// may set.
    pub fn pause_agent(&self, agent_id: AgentId) {
        self.excluded.lock().insert(agent_id);
    }

    pub fn resume_agent(&self, agent_id: AgentId) {
        self.excluded.lock().remove(&agent_id);
    }

    /// Requests an immediate dispatch attempt for `agent_id`. Silently
    /// dropped on channel overflow; the next tick covers it.
    pub fn schedule_now(&self, agent_id: AgentId) {
        if self.schedule_tx.try_send(agent_id).is_err() {
            tracing::warn!(%agent_id, "schedule-now channel full, next tick will cover it");
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot(self.excluded.lock().len())
    }

    fn is_eligible(&self, agent: &Agent) -> bool {
        if self.excluded.lock().contains(&agent.id) {
            return false;
        }
        if matches!(agent.state, AgentState::Paused | AgentState::Stopped) {
            return false;
        }
        if self.config.idle_state_required && agent.state != AgentState::Idle {
            return false;
        }
        agent.queue_length > 0
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_dispatches()));
        let mut schedule_rx = self.schedule_rx.lock().take().unwrap_or_else(|| {
            let (_tx, rx) = mpsc::channel(1);
            rx
        });

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_tick(&semaphore);
                }
                Some(agent_id) = schedule_rx.recv() => {
                    if let Some(agent) = self.state.agent(agent_id) {
                        if self.is_eligible(&agent) {
                            self.spawn_dispatch(agent_id, semaphore.clone());
                        }
                    }
                }
            }
        }

        let total_permits = self.config.max_concurrent_dispatches() as u32;
        let _ = semaphore.acquire_many(total_permits).await;
    }

    fn run_tick(self: &Arc<Self>, semaphore: &Arc<Semaphore>) {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }
        let now = self.now();
        let mut agents = self.state.list_agents();

        for agent in &agents {
            if let Ok(count) = self.queue.count(agent.id) {
                self.state.set_queue_length(agent.id, count);
            }
        }

        if self.config.auto_resume_enabled {
            for agent in &agents {
                if agent.state == AgentState::Paused && agent.paused_until.map(|until| until <= now).unwrap_or(false) {
                    let _ = self.state.force_state(agent.id, AgentState::Idle, "auto_resume", None);
                    self.excluded.lock().remove(&agent.id);
                }
            }
            agents = self.state.list_agents();
        }

        for agent in agents {
            if self.is_eligible(&agent) {
                self.spawn_dispatch(agent.id, semaphore.clone());
            }
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, agent_id: AgentId, semaphore: Arc<Semaphore>) {
        let Ok(permit) = semaphore.try_acquire_owned() else {
            return;
        };
        let this = self.clone();
        let dispatch_timeout = self.config.dispatch_timeout();
        let after_cooldown_threshold = self.config.after_cooldown_threshold();
        let now = self.now();

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::time::timeout(
                dispatch_timeout + std::time::Duration::from_secs(1),
                dispatch::dispatch_one(agent_id, this.queue.as_ref(), this.binding.as_ref(), this.event_log.as_ref(), now, after_cooldown_threshold, dispatch_timeout),
            )
            .await;

            match outcome {
                Ok(Ok(DispatchOutcome::Completed)) => {
                    tracing::debug!(%agent_id, "dispatch completed");
                }
                Ok(Ok(DispatchOutcome::Failed(err))) => {
                    tracing::warn!(%agent_id, error = %err, "dispatch failed");
                }
                Ok(Ok(DispatchOutcome::Paused(duration))) => {
                    this.excluded.lock().insert(agent_id);
                    tracing::debug!(%agent_id, duration_secs = duration.as_secs(), "dispatch paused agent, excluded until auto-resume");
                }
                Ok(Ok(DispatchOutcome::ConditionalRequeued)) => {
                    tracing::debug!(%agent_id, "conditional item re-queued");
                }
                Ok(Ok(DispatchOutcome::QueueEmpty)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(%agent_id, %err, "dispatch task error");
                }
                Err(_elapsed) => {
                    tracing::warn!(%agent_id, "dispatch task exceeded its outer timeout bound");
                }
            }
        });
    }
}
