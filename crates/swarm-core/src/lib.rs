// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-core: shared identifiers, data model, and error-kind vocabulary for
//! the swarm orchestration engine.

pub mod macros;

pub mod account;
pub mod agent;
pub mod clock;
pub mod duration;
pub mod error;
pub mod event;
pub mod id;
pub mod queue;
pub mod runner_event;
pub mod state_info;

pub use account::{Account, AccountId, CredentialRef, Provider, UsageStats};
pub use agent::{Agent, AgentId, AgentMetadata, AgentState, AgentType, WorkspaceId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ClassifiedError, ErrorKind};
pub use event::{EntityType, Event, EventId, EventType};
pub use queue::{ConditionKind, QueueItem, QueueItemId, QueueItemPayload, QueueItemStatus};
pub use runner_event::{RunnerEvent, RunnerEventKind};
pub use state_info::{Confidence, StateInfo};
