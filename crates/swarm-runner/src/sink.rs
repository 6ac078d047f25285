// SPDX-License-Identifier: MIT

//! Sink abstraction the runner emits RunnerEvents through (spec §4.1):
//! a no-op sink, a line-delimited JSON sink, and a persistent sink writing
//! into the Event Log.

use crate::error::RunnerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use swarm_core::runner_event::RunnerEventKind;
use swarm_core::{EntityType, Event, EventType, RunnerEvent};
use swarm_storage::EventLog;

/// Where the runner's RunnerEvents go. Sink errors are logged but never
/// abort the runner (spec §4.1).
#[async_trait]
pub trait Sink: Send + Sync {
    async fn emit(&self, event: RunnerEvent) -> Result<(), RunnerError>;
    async fn close(&self) -> Result<(), RunnerError>;
}

/// Discards every event. Used when no observer is configured.
pub struct NoopSink;

#[async_trait]
impl Sink for NoopSink {
    async fn emit(&self, _event: RunnerEvent) -> Result<(), RunnerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// Writes one JSON object per line to an arbitrary writer.
pub struct JsonLineSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W: Write + Send> Sink for JsonLineSink<W> {
    async fn emit(&self, event: RunnerEvent) -> Result<(), RunnerError> {
        let line = serde_json::to_string(&event).map_err(|e| RunnerError::Transient(e.to_string()))?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}").map_err(|e| RunnerError::Transient(e.to_string()))?;
        writer.flush().map_err(|e| RunnerError::Transient(e.to_string()))
    }

    async fn close(&self) -> Result<(), RunnerError> {
        self.writer.lock().flush().map_err(|e| RunnerError::Transient(e.to_string()))
    }
}

/// Persists every RunnerEvent into the Event Log (spec §4.6), mapping
/// runner-event kinds to the closed `EventType` vocabulary.
pub struct EventLogSink {
    log: std::sync::Arc<dyn EventLog>,
}

impl EventLogSink {
    pub fn new(log: std::sync::Arc<dyn EventLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Sink for EventLogSink {
    async fn emit(&self, event: RunnerEvent) -> Result<(), RunnerError> {
        let event_type = match event.kind {
            RunnerEventKind::Heartbeat => EventType::AgentHeartbeat,
            RunnerEventKind::InputSent => EventType::AgentInputSent,
            RunnerEventKind::OutputLine => EventType::AgentOutputLine,
            RunnerEventKind::PromptReady => EventType::AgentPromptReady,
            RunnerEventKind::Busy => EventType::AgentBusy,
            RunnerEventKind::Pause | RunnerEventKind::Cooldown => EventType::AgentPause,
            RunnerEventKind::SwapAccount => EventType::AccountRotated,
            RunnerEventKind::Exit => EventType::AgentStopped,
            RunnerEventKind::ControlError => EventType::AgentControlError,
        };

        let stored = Event::new(event_type, EntityType::Agent, event.agent_id.as_str()).with_payload(event.data);
        self.log.append(stored).map_err(|e| RunnerError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), RunnerError> {
        Ok(())
    }
}
