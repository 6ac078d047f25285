// SPDX-License-Identifier: MIT

//! The Event Log's Streamer: initial replay plus cursor-based polling with
//! exponential backoff, per spec §4.6.

use crate::event_log::EventLog;
use crate::query::{EventFilter, DEFAULT_QUERY_LIMIT};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::{Event, EventId};

/// Connection status reported to the `on_status` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct StreamerConfig {
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub max_attempts: Option<u32>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

/// Combines initial replay (optional, from `since`) with cursor-based
/// polling of an [`EventLog`].
pub struct Streamer<L: EventLog + ?Sized> {
    log: Arc<L>,
    config: StreamerConfig,
}

impl<L: EventLog + ?Sized> Streamer<L> {
    pub fn new(log: Arc<L>, config: StreamerConfig) -> Self {
        Self { log, config }
    }

    /// Stream events starting at `since` (if given) until `should_stop`
    /// returns true. `on_event` fires for every event in arrival order;
    /// `on_status` fires on connection-status transitions.
    pub async fn run(
        &self,
        since: Option<EventId>,
        mut on_event: impl FnMut(Event),
        mut on_status: impl FnMut(ConnectionStatus),
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<(), crate::error::StorageError> {
        let mut cursor = since;
        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0u32;
        on_status(ConnectionStatus::Connected);

        loop {
            if should_stop() {
                on_status(ConnectionStatus::Disconnected);
                return Ok(());
            }

            let filter = EventFilter { cursor, limit: Some(DEFAULT_QUERY_LIMIT), ..Default::default() };
            match self.log.query(filter) {
                Ok(page) => {
                    if attempts > 0 {
                        on_status(ConnectionStatus::Connected);
                    }
                    attempts = 0;
                    backoff = self.config.initial_backoff;

                    let got_any = !page.events.is_empty();
                    for event in page.events {
                        cursor = Some(event.id);
                        on_event(event);
                    }
                    if page.next_cursor.is_none() || !got_any {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
                Err(err) => {
                    attempts += 1;
                    if let Some(max) = self.config.max_attempts {
                        if attempts > max {
                            on_status(ConnectionStatus::Disconnected);
                            return Err(err);
                        }
                    }
                    on_status(ConnectionStatus::Reconnecting);
                    tokio::time::sleep(backoff).await;
                    let next_secs = (backoff.as_secs_f64() * self.config.multiplier)
                        .min(self.config.max_backoff.as_secs_f64());
                    backoff = Duration::from_secs_f64(next_secs);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::FileEventLog;
    use parking_lot::Mutex;
    use swarm_core::{EntityType, EventType, FakeClock};

    #[tokio::test(start_paused = true)]
    async fn replays_existing_events_then_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FileEventLog::open(dir.path().join("e.jsonl"), FakeClock::new()).unwrap());
        log.append(Event::new(EventType::AgentSpawned, EntityType::Agent, "agt-1")).unwrap();

        let streamer = Streamer::new(log, StreamerConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut ticks = 0;

        streamer
            .run(
                None,
                move |event| seen_clone.lock().push(event.entity_id.clone()),
                |_status| {},
                move || {
                    ticks += 1;
                    ticks > 1
                },
            )
            .await
            .unwrap();

        assert_eq!(seen.lock().as_slice(), ["agt-1"]);
    }
}
