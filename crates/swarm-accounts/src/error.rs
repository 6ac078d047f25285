// SPDX-License-Identifier: MIT

//! Error taxonomy for the Account Registry.

use swarm_core::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account not found: {0}")]
    NotFound(String),
    #[error("no available account for rotation")]
    NoAvailableAccounts,
    #[error("credential unresolved: {0}")]
    CredentialUnresolved(String),
}

impl ClassifiedError for AccountError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NoAvailableAccounts => ErrorKind::Empty,
            Self::CredentialUnresolved(_) => ErrorKind::Validation,
        }
    }
}
