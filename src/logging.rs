//! Tracing configuration and log routing.
//!
//! Both binaries log to stdout with a compact formatter and to a file. When
//! `RUSTY_INGEST_LOG_FILE` is set, logs are appended to that path; otherwise they go to
//! `logs/rusty-ingest.log`. The file layer writes through a non-blocking worker so a slow
//! disk never stalls an ingestion run.
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable overriding the log file path.
pub const LOG_FILE_VARIABLE: &str = "RUSTY_INGEST_LOG_FILE";
const LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "rusty-ingest.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// `RUST_LOG` controls filtering and defaults to `info`. The file layer is skipped when its
/// target cannot be opened. The writer guard lives in a static for the process lifetime.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Where file logs go: the override when set and non-blank, otherwise the default file.
fn log_file_path(override_path: Option<String>) -> PathBuf {
    match override_path {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => Path::new(LOG_DIR).join(LOG_FILE_NAME),
    }
}

/// Build a non-blocking writer appending to the log file.
fn configure_file_writer() -> Option<NonBlocking> {
    let path = log_file_path(std::env::var(LOG_FILE_VARIABLE).ok());
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty())
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

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
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
