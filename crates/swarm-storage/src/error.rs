// SPDX-License-Identifier: MIT

//! Error taxonomy for the Event Log and Queue Store.

use swarm_core::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid event: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("queue is empty")]
    Empty,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ClassifiedError for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Empty => ErrorKind::Empty,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Io(_) | Self::Serde(_) => ErrorKind::Transient,
        }
    }
}
