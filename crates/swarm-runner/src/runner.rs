// SPDX-License-Identifier: MIT

//! The Agent Runner (spec §4.1): forks a command under a PTY, parses its
//! output stream, emits RunnerEvents, accepts control commands, and
//! enforces scoped pauses.

use crate::control::{parse_control_line, ControlCommand};
use crate::error::RunnerError;
use crate::parser::{OutputParser, ParserLimits, ReadyReason};
use crate::patterns::PatternSet;
use crate::pty::Pty;
use crate::sink::Sink;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarm_core::runner_event::RunnerEventKind;
use swarm_core::{AgentId, AgentType, Clock, RunnerEvent, WorkspaceId};

/// Identity plus command vector for one `Run` invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub heartbeat_interval: Duration,
    /// How many of the most recent output lines ride along on a heartbeat.
    pub heartbeat_line_window: usize,
    pub parser_limits: ParserLimits,
    /// Max bytes of `SendInput`'s text forwarded in an `input_sent` preview.
    pub input_preview_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_line_window: 20,
            parser_limits: ParserLimits::default(),
            input_preview_bytes: 200,
        }
    }
}

struct RunnerState {
    paused_until: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    recent_lines: VecDeque<String>,
}

/// Wraps one interactive CLI process. `Run` owns the process for its whole
/// lifetime; `SendInput` may be called concurrently from another task.
pub struct AgentRunner<C: Clock> {
    pty: Arc<dyn Pty>,
    sink: Arc<dyn Sink>,
    clock: C,
    config: RunnerConfig,
    parser: Mutex<OutputParser>,
    state: Mutex<RunnerState>,
    write_lock: tokio::sync::Mutex<()>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    started: AtomicBool,
}

impl<C: Clock> AgentRunner<C> {
    pub fn new(pty: Arc<dyn Pty>, sink: Arc<dyn Sink>, clock: C, agent_type: AgentType, config: RunnerConfig) -> Self {
        let parser = OutputParser::new(PatternSet::for_agent_type(agent_type), config.parser_limits);
        Self {
            pty,
            sink,
            clock,
            config,
            parser: Mutex::new(parser),
            state: Mutex::new(RunnerState { paused_until: None, last_activity: None, recent_lines: VecDeque::new() }),
            write_lock: tokio::sync::Mutex::new(()),
            writer: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }

    async fn emit(&self, workspace_id: WorkspaceId, agent_id: AgentId, kind: RunnerEventKind, data: serde_json::Value) {
        let event = RunnerEvent::new(kind, workspace_id, agent_id, self.now(), data);
        if let Err(err) = self.sink.emit(event).await {
            tracing::warn!(%err, "sink emit failed");
        }
    }

    /// Blocks until the child exits or `control_source`/the cancel token ends it.
    pub async fn run(
        &self,
        ctx: RunContext,
        control_source: Option<Box<dyn Read + Send>>,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<(), RunnerError> {
        if ctx.workspace_id.as_str().is_empty() || ctx.agent_id.as_str().is_empty() || ctx.command.is_empty() {
            return Err(RunnerError::InvalidArgument("workspace_id, agent_id, and command are all required".into()));
        }

        let mut child = self.pty.spawn(&ctx.command)?;
        self.started.store(true, Ordering::SeqCst);
        *self.writer.lock() = Some(child.writer()?);
        let mut reader = child.reader()?;

        let (output_tx, mut output_rx) = tokio::sync::mpsc::channel::<Vec<u8>>(128);
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut control_rx = control_source.map(|source| {
            let (tx, rx) = tokio::sync::mpsc::channel::<String>(64);
            tokio::task::spawn_blocking(move || {
                for line in std::io::BufReader::new(source).lines().map_while(Result::ok) {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            });
            rx
        });

        let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = exit_tx.send(child.wait());
        });
        tokio::pin!(exit_rx);

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await; // first tick fires immediately; skip it

        let outcome = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break Err(RunnerError::Cancelled);
                }
                result = &mut exit_rx => {
                    let status_result = match result {
                        Ok(inner) => inner,
                        Err(_) => Err(RunnerError::Fatal("wait task dropped without a status".into())),
                    };
                    break status_result.map(|status| status.code);
                }
                Some(chunk) = output_rx.recv() => {
                    self.handle_output_chunk(&ctx, &chunk).await;
                }
                Some(line) = async {
                    match control_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.handle_control_line(&ctx, &line).await;
                }
                _ = heartbeat.tick() => {
                    self.emit_heartbeat(&ctx).await;
                }
            }
        };

        self.sink.close().await.ok();

        let (data, result) = match outcome {
            Ok(code) => (serde_json::json!({ "exit_code": code, "error": serde_json::Value::Null }), Ok(())),
            Err(RunnerError::Cancelled) => (serde_json::json!({ "exit_code": null, "error": "cancelled" }), Err(RunnerError::Cancelled)),
            Err(err) => (serde_json::json!({ "exit_code": null, "error": err.to_string() }), Err(err)),
        };
        self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), RunnerEventKind::Exit, data).await;
        result
    }

    async fn handle_output_chunk(&self, ctx: &RunContext, chunk: &[u8]) {
        let now = self.now();
        {
            let mut state = self.state.lock();
            state.last_activity = Some(now);
        }

        let result = self.parser.lock().feed(chunk);
        for line in result.lines {
            {
                let mut state = self.state.lock();
                state.recent_lines.push_back(line.text.clone());
                while state.recent_lines.len() > self.config.heartbeat_line_window {
                    state.recent_lines.pop_front();
                }
            }
            self.emit(
                ctx.workspace_id.clone(),
                ctx.agent_id.clone(),
                RunnerEventKind::OutputLine,
                serde_json::json!({ "text": line.text, "truncated": line.truncated }),
            )
            .await;
        }

        if let Some((ready, reason)) = result.transition {
            let (kind, reason_str) = match (ready, reason) {
                (true, ReadyReason::PromptMatch) => (RunnerEventKind::PromptReady, "prompt_match"),
                (false, ReadyReason::BusyMatch) => (RunnerEventKind::Busy, "busy_match"),
                (false, ReadyReason::OutputReceived) => (RunnerEventKind::Busy, "output_received"),
                _ => (RunnerEventKind::Busy, "output_received"),
            };
            self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), kind, serde_json::json!({ "reason": reason_str }))
                .await;
        }
    }

    async fn handle_control_line(&self, ctx: &RunContext, line: &str) {
        match parse_control_line(line) {
            ControlCommand::SendInput(text) => {
                if let Err(err) = self.send_input_as(ctx.workspace_id.clone(), ctx.agent_id.clone(), &text).await {
                    tracing::warn!(%err, "control-channel send_input failed");
                }
            }
            ControlCommand::Pause { duration } => {
                let now = self.now();
                let candidate = now + chrono::Duration::from_std(duration).unwrap_or_default();
                let mut state = self.state.lock();
                state.paused_until = Some(state.paused_until.map_or(candidate, |cur| cur.max(candidate)));
                drop(state);
                self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), RunnerEventKind::Pause, serde_json::json!({ "duration_secs": duration.as_secs() }))
                    .await;
            }
            ControlCommand::Cooldown { until } => {
                self.state.lock().paused_until = Some(until);
                self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), RunnerEventKind::Cooldown, serde_json::json!({ "until": until.to_rfc3339() }))
                    .await;
            }
            ControlCommand::SwapAccount { account_id } => {
                self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), RunnerEventKind::SwapAccount, serde_json::json!({ "account_id": account_id.as_str() }))
                    .await;
            }
            ControlCommand::Error { raw } => {
                self.emit(ctx.workspace_id.clone(), ctx.agent_id.clone(), RunnerEventKind::ControlError, serde_json::json!({ "raw": raw }))
                    .await;
            }
        }
    }

    async fn emit_heartbeat(&self, ctx: &RunContext) {
        let (idle_for, lines) = {
            let state = self.state.lock();
            let idle_for = state.last_activity.map(|t| self.now().signed_duration_since(t));
            (idle_for, state.recent_lines.iter().cloned().collect::<Vec<_>>())
        };
        let idle_for_str = idle_for
            .and_then(|d| d.to_std().ok())
            .map(swarm_core::duration::format_duration)
            .unwrap_or_else(|| "0s".to_string());

        self.emit(
            ctx.workspace_id.clone(),
            ctx.agent_id.clone(),
            RunnerEventKind::Heartbeat,
            serde_json::json!({ "idle_for": idle_for_str, "recent_lines": lines }),
        )
        .await;
    }

    /// Public entry point for callers outside the control channel (the
    /// scheduler dispatching a `message` queue item, per spec §4.4).
    pub async fn send_input(&self, workspace_id: WorkspaceId, agent_id: AgentId, text: &str) -> Result<(), RunnerError> {
        self.send_input_as(workspace_id, agent_id, text).await
    }

    async fn send_input_as(&self, workspace_id: WorkspaceId, agent_id: AgentId, text: &str) -> Result<(), RunnerError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(RunnerError::NotStarted);
        }

        self.wait_for_pause_to_clear().await;

        let _permit = self.write_lock.lock().await;
        {
            let mut guard = self.writer.lock();
            let writer = guard.as_mut().ok_or(RunnerError::NotStarted)?;
            writer
                .write_all(text.as_bytes())
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|e| RunnerError::Transient(e.to_string()))?;
        }

        let now = self.now();
        self.state.lock().last_activity = Some(now);

        let truncated = text.len() > self.config.input_preview_bytes;
        let preview = if truncated { &text[..self.config.input_preview_bytes.min(text.len())] } else { text };
        self.emit(
            workspace_id.clone(),
            agent_id.clone(),
            RunnerEventKind::InputSent,
            serde_json::json!({ "text": preview, "truncated": truncated }),
        )
        .await;

        if self.parser.lock().force_busy() {
            self.emit(workspace_id, agent_id, RunnerEventKind::Busy, serde_json::json!({ "reason": "input_sent" })).await;
        }

        Ok(())
    }

    async fn wait_for_pause_to_clear(&self) {
        loop {
            let until = self.state.lock().paused_until;
            match until {
                Some(t) if t > self.now() => tokio::time::sleep(Duration::from_millis(20)).await,
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::test_support::PipePty;
    use crate::pty::ExitStatus;
    use crate::sink::Sink;
    use swarm_core::FakeClock;

    struct RecordingSink {
        events: Mutex<Vec<RunnerEvent>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self { events: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait::async_trait]
    impl Sink for RecordingSink {
        async fn emit(&self, event: RunnerEvent) -> Result<(), RunnerError> {
            self.events.lock().push(event);
            Ok(())
        }

        async fn close(&self) -> Result<(), RunnerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_emits_exit_exactly_once_on_clean_exit() {
        let (pty, handle) = PipePty::new();
        let sink = RecordingSink::new();
        let runner = AgentRunner::new(pty, sink.clone(), FakeClock::new(), AgentType::Generic, RunnerConfig::default());

        let ctx = RunContext { workspace_id: WorkspaceId::new(), agent_id: AgentId::new(), command: vec!["agent".into()] };
        let cancel = tokio_util::sync::CancellationToken::new();

        let run_fut = runner.run(ctx, None, cancel);
        handle.push_output(b"some output\n".to_vec());
        handle.exit(ExitStatus { code: 0, success: true });
        run_fut.await.unwrap();

        let events = sink.events.lock();
        let exits: Vec<_> = events.iter().filter(|e| e.kind == RunnerEventKind::Exit).collect();
        assert_eq!(exits.len(), 1);
    }

    #[tokio::test]
    async fn run_rejects_empty_command() {
        let (pty, _handle) = PipePty::new();
        let sink = RecordingSink::new();
        let runner = AgentRunner::new(pty, sink, FakeClock::new(), AgentType::Generic, RunnerConfig::default());
        let ctx = RunContext { workspace_id: WorkspaceId::new(), agent_id: AgentId::new(), command: vec![] };
        let cancel = tokio_util::sync::CancellationToken::new();
        let result = runner.run(ctx, None, cancel).await;
        assert!(matches!(result, Err(RunnerError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn send_input_before_start_fails_not_started() {
        let (pty, _handle) = PipePty::new();
        let sink = RecordingSink::new();
        let runner = AgentRunner::new(pty, sink, FakeClock::new(), AgentType::Generic, RunnerConfig::default());
        let result = runner.send_input(WorkspaceId::new(), AgentId::new(), "hi").await;
        assert!(matches!(result, Err(RunnerError::NotStarted)));
    }

    #[tokio::test]
    async fn cancelling_the_token_stops_the_run_loop() {
        let (pty, _handle) = PipePty::new();
        let sink = RecordingSink::new();
        let runner = AgentRunner::new(pty, sink, FakeClock::new(), AgentType::Generic, RunnerConfig::default());
        let ctx = RunContext { workspace_id: WorkspaceId::new(), agent_id: AgentId::new(), command: vec!["agent".into()] };
        let cancel = tokio_util::sync::CancellationToken::new();
        let cancel_clone = cancel.clone();

        let run_fut = runner.run(ctx, None, cancel);
        cancel_clone.cancel();
        let result = run_fut.await;
        assert!(matches!(result, Err(RunnerError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_cadence_is_within_one_of_interval_over_time() {
        let (pty, _handle) = PipePty::new();
        let sink = RecordingSink::new();
        let config = RunnerConfig { heartbeat_interval: Duration::from_secs(10), ..RunnerConfig::default() };
        let runner = Arc::new(AgentRunner::new(pty, sink.clone(), FakeClock::new(), AgentType::Generic, config));
        let ctx = RunContext { workspace_id: WorkspaceId::new(), agent_id: AgentId::new(), command: vec!["agent".into()] };
        let cancel = tokio_util::sync::CancellationToken::new();
        let cancel_clone = cancel.clone();
        let runner_clone = runner.clone();

        let handle = tokio::spawn(async move { runner_clone.run(ctx, None, cancel_clone).await });
        tokio::task::yield_now().await;

        let interval = Duration::from_secs(10);
        let elapsed = Duration::from_secs(95);
        tokio::time::advance(elapsed).await;

        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RunnerError::Cancelled)));

        let heartbeats = sink.events.lock().iter().filter(|e| e.kind == RunnerEventKind::Heartbeat).count() as i64;
        let expected = (elapsed.as_secs() / interval.as_secs()) as i64;
        assert!(
            (heartbeats - expected).abs() <= 1,
            "expected {expected} heartbeats (+/- 1) over {elapsed:?} at a {interval:?} cadence, got {heartbeats}"
        );
    }
}
