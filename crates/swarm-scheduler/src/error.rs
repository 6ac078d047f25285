// SPDX-License-Identifier: MIT

//! Error taxonomy for the Scheduler.

use swarm_core::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is not running")]
    NotRunning,
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("custom_expression conditions are not implemented")]
    NotImplemented,
    #[error(transparent)]
    Storage(#[from] swarm_storage::StorageError),
    #[error(transparent)]
    Runner(#[from] swarm_runner::RunnerError),
}

impl ClassifiedError for SchedulerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning => ErrorKind::Conflict,
            Self::NotRunning => ErrorKind::Validation,
            Self::AgentNotFound(_) => ErrorKind::NotFound,
            Self::NotImplemented => ErrorKind::Validation,
            Self::Storage(e) => e.kind(),
            Self::Runner(e) => e.kind(),
        }
    }
}
