// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-accounts: the Account Registry. Tracks provider accounts, their
//! cooldown windows, and drives LRU rotation across same-provider accounts.

pub mod credential;
pub mod error;
pub mod registry;

pub use credential::{resolve, CaamResolver, NoCaamResolver};
pub use error::AccountError;
pub use registry::AccountRegistry;
