// SPDX-License-Identifier: MIT

//! The agent binding interface (spec §6), consumed by the scheduler to
//! cross into the runner / state-engine / account-registry without
//! depending on their concrete types directly.

use crate::error::SchedulerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swarm_accounts::AccountRegistry;
use swarm_core::{Account, AccountId, Agent, AgentId, AgentState, Clock, WorkspaceId};
use swarm_runner::{AgentRunner, RunContext};
use swarm_state::StateEngine;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default)]
pub struct SendMessageOpts {
    pub skip_idle_check: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListAgentsOpts {
    pub workspace_id: Option<WorkspaceId>,
    pub state: Option<AgentState>,
    pub include_queue_length: bool,
}

/// Operations the scheduler needs against a running agent, decoupled from
/// the concrete runner/state-engine/account-registry types (spec §9's
/// cyclic-reference note).
#[async_trait]
pub trait AgentBinding: Send + Sync {
    async fn send_message(&self, agent_id: AgentId, text: &str, opts: SendMessageOpts) -> Result<(), SchedulerError>;
    async fn pause_agent(&self, agent_id: AgentId, duration: Duration) -> Result<(), SchedulerError>;
    async fn resume_agent(&self, agent_id: AgentId) -> Result<(), SchedulerError>;
    async fn restart_agent_with_account(&self, agent_id: AgentId, account_id: AccountId) -> Result<Account, SchedulerError>;
    fn get_agent(&self, agent_id: AgentId) -> Result<Agent, SchedulerError>;
    fn list_agents(&self, opts: ListAgentsOpts) -> Vec<Agent>;
}

struct RunnerHandle<C: Clock> {
    runner: Arc<AgentRunner<C>>,
    ctx: RunContext,
    cancel: CancellationToken,
}

/// The composition root's [`AgentBinding`]: one [`AgentRunner`] per agent,
/// the shared [`StateEngine`], and the shared [`AccountRegistry`].
pub struct InProcessBinding<C: Clock> {
    state: Arc<StateEngine<C>>,
    accounts: Arc<AccountRegistry<C>>,
    runners: parking_lot::RwLock<HashMap<AgentId, RunnerHandle<C>>>,
}

impl<C: Clock> InProcessBinding<C> {
    pub fn new(state: Arc<StateEngine<C>>, accounts: Arc<AccountRegistry<C>>) -> Self {
        Self { state, accounts, runners: parking_lot::RwLock::new(HashMap::new()) }
    }

    /// Registers a spawned runner so the scheduler can address it by agent
    /// ID. The caller is responsible for having already started `run()` on
    /// its own task using the same `cancel` token.
    pub fn register(&self, runner: Arc<AgentRunner<C>>, ctx: RunContext, cancel: CancellationToken) {
        let agent_id = ctx.agent_id;
        self.runners.write().insert(agent_id, RunnerHandle { runner, ctx, cancel });
    }

    pub fn deregister(&self, agent_id: AgentId) {
        self.runners.write().remove(&agent_id);
    }
}

#[async_trait]
impl<C: Clock + 'static> AgentBinding for InProcessBinding<C> {
    async fn send_message(&self, agent_id: AgentId, text: &str, opts: SendMessageOpts) -> Result<(), SchedulerError> {
        let agent = self.get_agent(agent_id)?;
        if !opts.skip_idle_check && agent.state != AgentState::Idle {
            return Err(SchedulerError::AgentNotFound(format!("{agent_id} is not idle")));
        }
        let runner = {
            let runners = self.runners.read();
            let handle = runners.get(&agent_id).ok_or_else(|| SchedulerError::AgentNotFound(agent_id.to_string()))?;
            (handle.runner.clone(), handle.ctx.workspace_id.clone())
        };
        runner.0.send_input(runner.1, agent_id, text).await?;
        Ok(())
    }

    async fn pause_agent(&self, agent_id: AgentId, duration: Duration) -> Result<(), SchedulerError> {
        self.get_agent(agent_id)?;
        let until = chrono::Utc::now() + chrono::Duration::from_std(duration).unwrap_or_default();
        self.state.force_state(agent_id, AgentState::Paused, "scheduler_pause", Some(until))?;
        Ok(())
    }

    async fn resume_agent(&self, agent_id: AgentId) -> Result<(), SchedulerError> {
        self.get_agent(agent_id)?;
        self.state.force_state(agent_id, AgentState::Idle, "scheduler_resume", None)?;
        Ok(())
    }

    async fn restart_agent_with_account(&self, agent_id: AgentId, account_id: AccountId) -> Result<Account, SchedulerError> {
        let account = self.accounts.get(account_id).map_err(|e| SchedulerError::AgentNotFound(e.to_string()))?;

        if let Some(cancel) = self.runners.read().get(&agent_id).map(|h| h.cancel.clone()) {
            cancel.cancel();
        }
        self.deregister(agent_id);

        self.state.set_account(agent_id, Some(account_id));
        Ok(account)
    }

    fn get_agent(&self, agent_id: AgentId) -> Result<Agent, SchedulerError> {
        self.state.agent(agent_id).ok_or_else(|| SchedulerError::AgentNotFound(agent_id.to_string()))
    }

    fn list_agents(&self, opts: ListAgentsOpts) -> Vec<Agent> {
        self.state
            .list_agents()
            .into_iter()
            .filter(|a| opts.workspace_id.as_ref().map(|w| w == &a.workspace_id).unwrap_or(true))
            .filter(|a| opts.state.map(|s| s == a.state).unwrap_or(true))
            .map(|mut a| {
                if !opts.include_queue_length {
                    a.queue_length = 0;
                }
                a
            })
            .collect()
    }
}
