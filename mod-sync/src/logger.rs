//! Application logging
//!
//! Thin wrappers over `tracing` so every module logs with a context tag,
//! plus subscriber setup writing to stderr and a daily rolling file.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::app_dirs;

const DEFAULT_CONTEXT: &str = "app";
const LOG_FILE_PREFIX: &str = "twmt-mod-sync.log";
const LOG_ENV_VAR: &str = "TWMT_LOG";

/// Keeps the file writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Default filter directive, overridden by `TWMT_LOG`
    pub level: String,
    /// Directory for the rolling log file; `None` disables file output
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: Some(app_dirs::get_logs_dir()),
            ansi: true,
        }
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(options: &LoggingOptions) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(options.level.as_str()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(options.ansi)
        .with_target(false);

    let file_layer = options.log_dir.as_ref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {}", dir.display(), e);
            return None;
        }
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

pub fn log_info(message: &str, context: Option<&str>) {
    tracing::info!(context = context.unwrap_or(DEFAULT_CONTEXT), "{}", message);
}

pub fn log_warn(message: &str, context: Option<&str>) {
    tracing::warn!(context = context.unwrap_or(DEFAULT_CONTEXT), "{}", message);
}

pub fn log_error(message: &str, context: Option<&str>) {
    tracing::error!(context = context.unwrap_or(DEFAULT_CONTEXT), "{}", message);
}

pub fn log_debug(message: &str, context: Option<&str>, location: Option<&str>) {
    tracing::debug!(
        context = context.unwrap_or(DEFAULT_CONTEXT),
        location = location.unwrap_or(""),
        "{}",
        message
    );
}

pub fn is_debug_enabled() -> bool {
    tracing::enabled!(tracing::Level::DEBUG)
}

/// Debug log with the call site attached
#[macro_export]
macro_rules! log_debug {
    ($msg:expr, $ctx:expr) => {
        $crate::logger::log_debug($msg, Some($ctx), Some(concat!(file!(), ":", line!())))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_without_subscriber_does_not_panic() {
        log_info("info line", Some("test"));
        log_warn("warn line", None);
        log_error("error line", Some("test"));
        crate::log_debug!("debug line", "test");
    }

    #[test]
    fn test_init_is_idempotent() {
        let options = LoggingOptions {
            level: "debug".to_string(),
            log_dir: None,
            ansi: false,
        };
        init_logging(&options);
        init_logging(&options);
        log_info("after init", Some("test"));
    }
}
