// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-state: the State Engine. Maintains each agent's authoritative
//! state, infers transitions from transcript text and runner events, and
//! fans out changes to subscribers.

pub mod engine;
pub mod error;
pub mod inference;
pub mod subscriber;

pub use engine::StateEngine;
pub use error::StateError;
pub use inference::infer_from_transcript;
pub use subscriber::{FnSubscriber, StateChange, Subscriber};
