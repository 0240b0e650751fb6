//! Logging setup and per-module switchable log macros.
//!
//! Chatty modules (the ticker, the provider socket) gate their output behind a
//! module-level flag so a single line can silence them:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info};
//!
//! log_info!("provider connected");
//! ```

use log::LevelFilter;

/// Env var that lowers the default filter to `Debug`.
pub const DEBUG_ENV: &str = "LEARNSENSE_DEBUG";

pub fn debug_enabled(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|value| value.trim().to_ascii_lowercase()),
        Some(value) if matches!(value.as_str(), "1" | "true" | "yes" | "on")
    )
}

/// Installs `env_logger`. `RUST_LOG` still wins over the default level.
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let debug = debug_enabled(std::env::var(DEBUG_ENV).ok().as_deref());
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Info logging, only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn logging, only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error logging, only when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Per-tick detail; stays quiet unless the filter is at `Debug`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
