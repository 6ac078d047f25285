// SPDX-License-Identifier: MIT

//! Error taxonomy for the Agent Runner.

use swarm_core::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to start child: {0}")]
    StartFailed(String),

    #[error("runner has not been started")]
    NotStarted,

    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("cancelled")]
    Cancelled,
}

impl ClassifiedError for RunnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::StartFailed(_) => ErrorKind::Fatal,
            Self::NotStarted => ErrorKind::Validation,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Fatal(_) => ErrorKind::Fatal,
            Self::Cancelled => ErrorKind::Transient,
        }
    }
}
