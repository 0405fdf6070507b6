//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level. The TUI owns the
//! terminal, so in that mode events are appended to a log file instead.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(log_level: &str) -> EnvFilter {
    let default_filter = format!("warn,rewrite_tutor={log_level}");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Log to stderr (text and JSON modes).
pub fn init_stderr(log_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .ok();
}

pub fn log_file_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("rewrite-tutor").join("rewrite-tutor.log"))
}

/// Log to a file under the cache directory (TUI mode). Returns the file path.
pub fn init_file(log_level: &str) -> Result<PathBuf> {
    let path = log_file_path().context("no cache directory available for the log file")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()
        .ok();
    Ok(path)
}
