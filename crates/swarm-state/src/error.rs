// SPDX-License-Identifier: MIT

//! Error taxonomy for the State Engine.

use swarm_core::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("subscriber already registered: {0}")]
    AlreadySubscribed(String),
}

impl ClassifiedError for StateError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadySubscribed(_) => ErrorKind::AlreadyExists,
        }
    }
}
