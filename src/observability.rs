// SPDX-License-Identifier: Apache-2.0

//! Logging and observability helpers.
//!
//! Library code only emits `tracing` events; the binary decides where they
//! go by handing a [`LogSettings`] to [`init_tracing`].

pub mod sensitive;

pub use sensitive::Sensitive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "dbfanout.log";
const LOG_RETENTION_DAYS: u64 = 14;
const DEFAULT_FILTER: &str = "dbfanout=info";

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory holding the daily log files
    pub directory: PathBuf,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
    /// Also print human-readable events on stderr
    pub stderr: bool,
    pub retention_days: u64,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            default_filter: DEFAULT_FILTER.to_string(),
            stderr: true,
            retention_days: LOG_RETENTION_DAYS,
        }
    }
}

/// Installs the global subscriber: JSON lines to a daily file plus compact
/// stderr output.
pub fn init_tracing(settings: &LogSettings) {
    let log_dir = &settings.directory;
    let _ = fs::create_dir_all(log_dir);

    // 1. Clean up old logs
    if let Err(e) = cleanup_old_logs(log_dir, settings.retention_days) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    // 2. Setup file appender
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE);

    let stderr_layer = settings.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    // 3. Setup subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    // 4. Register panic hook
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("PANIC: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("PANIC: {}", s)
        } else {
            "PANIC: unknown cause".to_string()
        };

        tracing::error!(target: "panic", location = %location, message = %msg, "Task panicked");

        previous_hook(panic_info);
    }));

    tracing::debug!("Tracing initialized. Logs directory: {:?}", log_dir);
}

fn default_log_directory() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".dbfanout");
    path.push("logs");
    path
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<()> {
    let entries = fs::read_dir(log_dir)?;
    let now = SystemTime::now();
    let retention_duration = Duration::from_secs(retention_days * 24 * 60 * 60);

    for entry in entries {
        let path = entry?.path();

        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if matches!(age, Some(age) if age > retention_duration) {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("Failed to remove old log file {:?}: {}", path, e);
            }
        }
    }
    Ok(())
}
