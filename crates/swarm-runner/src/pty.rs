// SPDX-License-Identifier: MIT

//! Pseudo-terminal abstraction (spec §9: "the least portable part").
//!
//! `Pty` is the single seam the rest of this crate depends on; production
//! code is wired to [`PortablePty`], tests wire a scripted pipe pair.

use crate::error::RunnerError;
use std::io::{Read, Write};

/// The child process's exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i32,
    pub success: bool,
}

/// A spawned child attached to a pseudo-terminal.
pub trait PtyChild: Send {
    fn reader(&mut self) -> Result<Box<dyn Read + Send>, RunnerError>;
    fn writer(&mut self) -> Result<Box<dyn Write + Send>, RunnerError>;
    /// Blocks until the child exits. Called from a blocking task.
    fn wait(&mut self) -> Result<ExitStatus, RunnerError>;
    fn resize(&mut self, rows: u16, cols: u16) -> Result<(), RunnerError>;
    fn kill(&mut self) -> Result<(), RunnerError>;
}

/// Starts commands under a pseudo-terminal.
pub trait Pty: Send + Sync {
    fn spawn(&self, command: &[String]) -> Result<Box<dyn PtyChild>, RunnerError>;
}

/// Production implementation backed by `portable-pty`.
pub struct PortablePty;

impl Pty for PortablePty {
    fn spawn(&self, command: &[String]) -> Result<Box<dyn PtyChild>, RunnerError> {
        use portable_pty::{native_pty_system, CommandBuilder, PtySize};

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| RunnerError::StartFailed(e.to_string()))?;

        let (program, args) = command.split_first().ok_or_else(|| {
            RunnerError::InvalidArgument("command must have at least one element".into())
        })?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);

        let child = pair.slave.spawn_command(cmd).map_err(|e| RunnerError::StartFailed(e.to_string()))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| RunnerError::StartFailed(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| RunnerError::StartFailed(e.to_string()))?;

        Ok(Box::new(PortablePtyChild { master: pair.master, reader: Some(reader), writer: Some(writer), child }))
    }
}

struct PortablePtyChild {
    master: Box<dyn portable_pty::MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
}

impl PtyChild for PortablePtyChild {
    fn reader(&mut self) -> Result<Box<dyn Read + Send>, RunnerError> {
        self.reader.take().ok_or_else(|| RunnerError::Fatal("reader taken more than once".into()))
    }

    fn writer(&mut self) -> Result<Box<dyn Write + Send>, RunnerError> {
        self.writer.take().ok_or_else(|| RunnerError::Fatal("writer taken more than once".into()))
    }

    fn wait(&mut self) -> Result<ExitStatus, RunnerError> {
        let status =
            self.child.wait().map_err(|e| RunnerError::Fatal(format!("child wait failed: {e}")))?;
        Ok(ExitStatus { code: status.exit_code() as i32, success: status.success() })
    }

    fn resize(&mut self, rows: u16, cols: u16) -> Result<(), RunnerError> {
        use portable_pty::PtySize;
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| RunnerError::Transient(e.to_string()))
    }

    fn kill(&mut self) -> Result<(), RunnerError> {
        self.child.kill().map_err(|e| RunnerError::Transient(e.to_string()))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! A scripted pipe-pair double implementing [`Pty`], per spec §9's
    //! "mock it with a pipe pair in tests".

    use super::*;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::sync::Arc;

    /// Handle used by a test to feed output and signal exit.
    pub struct PipePtyHandle {
        output_tx: mpsc::Sender<Vec<u8>>,
        exit_tx: mpsc::Sender<ExitStatus>,
        writes: Arc<Mutex<Vec<u8>>>,
    }

    impl PipePtyHandle {
        /// Feed a chunk of output, as if the child process printed it.
        pub fn push_output(&self, chunk: impl Into<Vec<u8>>) {
            let _ = self.output_tx.send(chunk.into());
        }

        /// Signal that the child exited.
        pub fn exit(&self, status: ExitStatus) {
            let _ = self.exit_tx.send(status);
        }

        /// Everything written to the pty by `SendInput`, in write order.
        pub fn writes(&self) -> Vec<u8> {
            self.writes.lock().clone()
        }
    }

    /// A [`Pty`] whose single spawn is driven entirely by the paired
    /// [`PipePtyHandle`], ignoring the command vector.
    pub struct PipePty {
        child: Mutex<Option<PipePtyChildParts>>,
    }

    struct PipePtyChildParts {
        output_rx: mpsc::Receiver<Vec<u8>>,
        exit_rx: mpsc::Receiver<ExitStatus>,
        writes: Arc<Mutex<Vec<u8>>>,
    }

    impl PipePty {
        pub fn new() -> (Arc<Self>, PipePtyHandle) {
            let (output_tx, output_rx) = mpsc::channel();
            let (exit_tx, exit_rx) = mpsc::channel();
            let writes = Arc::new(Mutex::new(Vec::new()));
            let handle = PipePtyHandle { output_tx, exit_tx, writes: writes.clone() };
            let pty = Arc::new(Self { child: Mutex::new(Some(PipePtyChildParts { output_rx, exit_rx, writes })) });
            (pty, handle)
        }
    }

    impl Pty for PipePty {
        fn spawn(&self, _command: &[String]) -> Result<Box<dyn PtyChild>, RunnerError> {
            let parts = self
                .child
                .lock()
                .take()
                .ok_or_else(|| RunnerError::StartFailed("pipe pty already spawned".into()))?;
            Ok(Box::new(PipePtyChild {
                output_rx: Some(parts.output_rx),
                exit_rx: Some(parts.exit_rx),
                writes: parts.writes,
                pending: Vec::new(),
            }))
        }
    }

    struct PipePtyChild {
        output_rx: Option<mpsc::Receiver<Vec<u8>>>,
        exit_rx: Option<mpsc::Receiver<ExitStatus>>,
        writes: Arc<Mutex<Vec<u8>>>,
        pending: Vec<u8>,
    }

    impl PtyChild for PipePtyChild {
        fn reader(&mut self) -> Result<Box<dyn Read + Send>, RunnerError> {
            let rx = self
                .output_rx
                .take()
                .ok_or_else(|| RunnerError::Fatal("reader taken more than once".into()))?;
            Ok(Box::new(PipePtyReader { rx, pending: std::mem::take(&mut self.pending) }))
        }

        fn writer(&mut self) -> Result<Box<dyn Write + Send>, RunnerError> {
            Ok(Box::new(PipePtyWriter { sink: self.writes.clone() }))
        }

        fn wait(&mut self) -> Result<ExitStatus, RunnerError> {
            self.exit_rx
                .take()
                .expect("wait called more than once")
                .recv()
                .map_err(|_| RunnerError::Fatal("pty exit channel closed without a status".into()))
        }

        fn resize(&mut self, _rows: u16, _cols: u16) -> Result<(), RunnerError> {
            Ok(())
        }

        fn kill(&mut self) -> Result<(), RunnerError> {
            Ok(())
        }
    }

    struct PipePtyReader {
        rx: mpsc::Receiver<Vec<u8>>,
        pending: Vec<u8>,
    }

    impl Read for PipePtyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                match self.rx.recv() {
                    Ok(chunk) => self.pending = chunk,
                    Err(_) => return Ok(0),
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    struct PipePtyWriter {
        sink: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for PipePtyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sink.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
