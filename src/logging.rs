//! Tracing configuration for the `domainlog` binary.
//!
//! Diagnostics go to stdout through a compact formatter filtered by `RUST_LOG` (default `info`),
//! and optionally to a file when `DOMAINLOG_DIAG_FILE` is set. Every event, regardless of
//! `RUST_LOG`, is also handed to the [`TracingBridge`] so the bus can route it by domain.
use std::sync::{Arc, OnceLock};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::bridge::TracingBridge;
use crate::stream::LogBus;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: filtered stdout and file diagnostics plus the bus bridge.
///
/// Uses a global guard to keep the non‑blocking file writer alive for the process lifetime.
pub fn init_tracing(bus: Arc<LogBus>) {
    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter());

    let file_layer = configure_file_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
            .with_filter(env_filter())
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(TracingBridge::new(bus))
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build a non‑blocking writer for diagnostic file logging.
///
/// Returns `None` when `DOMAINLOG_DIAG_FILE` is unset or the file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = std::env::var("DOMAINLOG_DIAG_FILE").ok()?;
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open diagnostic log file {path}: {err}");
            None
        }
    }
}
