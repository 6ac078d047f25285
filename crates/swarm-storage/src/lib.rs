// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-storage: the Event Log and Queue Store.

pub mod error;
pub mod event_log;
pub mod query;
pub mod queue_store;
pub mod streamer;
pub mod wal;

pub use error::StorageError;
pub use event_log::{EventLog, FileEventLog};
pub use query::{EventFilter, EventPage, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
pub use queue_store::{FileQueueStore, QueueStore};
pub use streamer::{ConnectionStatus, Streamer, StreamerConfig};
