// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! The Scheduler component (spec §4.4): tick-loop dispatch, conditions,
//! the agent binding seam, dispatch statistics, and composition-root
//! logging init.

mod binding;
mod condition;
mod config;
mod dispatch;
mod error;
mod logging;
mod scheduler;
mod stats;

pub use binding::{AgentBinding, InProcessBinding, ListAgentsOpts, SendMessageOpts};
pub use config::SchedulerConfig;
pub use dispatch::{dispatch_one, DispatchOutcome};
pub use error::SchedulerError;
pub use logging::init as init_logging;
pub use scheduler::Scheduler;
pub use stats::{DispatchStats, StatsRecorder};
