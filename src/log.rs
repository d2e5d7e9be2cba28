//! Structured logging for debugging taskforge.
//!
//! Log levels:
//! - ERROR: Critical failures that prevent operations from completing
//! - WARN: Unexpected conditions that are recoverable (ambiguous tasks, failed subtasks)
//! - INFO: Run-level notifications (analysis, scheduler start/finish, run recorded)
//! - DEBUG: Per-subtask traces (dispatch, completion, propagation)
//!
//! Debug mode can be enabled with `--debug` flag or `TASKFORGE_DEBUG=1` env var.
//! `RUST_LOG` overrides both.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Environment variable that turns on debug logging.
pub const DEBUG_ENV: &str = "TASKFORGE_DEBUG";

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize logging to ~/.taskforge/taskforge.log
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging with explicit debug mode setting.
///
/// Falls back to stderr when there is no home directory. Calling this more
/// than once keeps the first subscriber.
pub fn init_with_debug(debug: bool) {
    let env_debug = std::env::var(DEBUG_ENV)
        .map(|v| parse_flag(&v))
        .unwrap_or(false);

    let debug_enabled = debug || env_debug;
    DEBUG_ENABLED.store(debug_enabled, Ordering::SeqCst);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_enabled)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false);

    // Truncate file on startup
    let installed = match log_path().and_then(|path| File::create(path).ok()) {
        Some(file) => builder.with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("logging already initialised");
    }
}

/// Check if debug mode is enabled.
pub fn is_debug() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Path of the log file, creating its directory.
pub fn log_path() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".taskforge");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("taskforge.log"))
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "taskforge=debug"
    } else {
        "taskforge=info"
    }
}
