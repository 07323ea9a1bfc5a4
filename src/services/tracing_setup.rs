//! Tracing subscriber setup
//!
//! Shared subscriber configuration for applications embedding the engine.
//! Components log through their [`LogContext`](super::logging::LogContext);
//! this module only decides where those events end up.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber writing to `log_file_path`.
///
/// Filtering follows `RUST_LOG`, with DEBUG as the floor for this crate.
pub fn init_global(log_file_path: &Path) -> io::Result<()> {
    let log_file = File::create(log_file_path)?;
    build_subscriber(log_file)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Build a subscriber that writes formatted events to `log_file`.
pub fn build_subscriber(log_file: File) -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into());

    let fmt_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry().with(fmt_layer).with(env_filter)
}
