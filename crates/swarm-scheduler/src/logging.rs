// SPDX-License-Identifier: MIT

//! Composition-root logging init (spec §10.1).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,hyper=warn,tokio=warn";

/// Initializes the global `tracing` subscriber. Reads `RUST_LOG`; falls back
/// to `info` for this workspace's own crates and `warn` for dependencies.
///
/// When `log_file` is set, logs are appended there (no ANSI) in addition to
/// stderr; otherwise only stderr gets them.
pub fn init(log_file: Option<&std::path::Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking);
            tracing_subscriber::registry().with(filter).with(stderr_layer).with(file_layer).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr_layer).init();
            Ok(None)
        }
    }
}
