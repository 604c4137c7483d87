//! Logging infrastructure for Tabula.
//!
//! Logging is controlled by environment variables, optionally overridden by
//! the `[debug]` section of `tabula.toml`.
//!
//! # Environment Variables
//!
//! - `TABULA_DEBUG=true|1|yes` - Enable debug logging
//! - `TABULA_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `TABULA_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use tabula_schema::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```
//!
//! Without the `tracing-subscriber` feature nothing is installed and the
//! host application's subscriber receives every event.

use std::env;
use std::sync::Once;

use crate::config::DebugConfig;

static INIT: Once = Once::new();

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check if debug logging is enabled via `TABULA_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("TABULA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `TABULA_LOG_LEVEL`.
///
/// Defaults to "debug" if `TABULA_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    env::var("TABULA_LOG_LEVEL")
        .ok()
        .and_then(|level| normalize_level(&level))
        .unwrap_or_else(default_level)
}

/// Get the configured log format from `TABULA_LOG_FORMAT`.
///
/// Defaults to "json" for structured logging.
pub fn get_log_format() -> &'static str {
    env::var("TABULA_LOG_FORMAT")
        .map(|f| normalize_format(&f))
        .unwrap_or("json")
}

fn default_level() -> &'static str {
    if is_debug_enabled() { "debug" } else { "warn" }
}

fn normalize_level(level: &str) -> Option<&'static str> {
    let level = level.to_lowercase();
    LEVELS.iter().find(|known| **known == level).copied()
}

fn normalize_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "pretty" => "pretty",
        "compact" => "compact",
        _ => "json",
    }
}

/// Initialize the Tabula logging system from the environment.
///
/// Subsequent calls are no-ops. Nothing is installed unless `TABULA_DEBUG`
/// or `TABULA_LOG_LEVEL` is set.
pub fn init() {
    if !is_debug_enabled() && env::var("TABULA_LOG_LEVEL").is_err() {
        return;
    }
    install(get_log_level(), get_log_format());
}

/// Initialize logging, letting `[debug]` config values win over the
/// environment.
///
/// Called by [`MigrationSession::new`](crate::MigrationSession::new); a
/// subscriber already installed by the host application is left alone.
pub fn init_with_config(debug: &DebugConfig) {
    let level = debug.log_level.as_deref().and_then(normalize_level);
    let format = debug.log_format.as_deref().map(normalize_format);
    match level {
        Some(level) => install(level, format.unwrap_or_else(get_log_format)),
        None if format.is_some() || is_debug_enabled() => {
            install(get_log_level(), format.unwrap_or_else(get_log_format));
        }
        None => init(),
    }
}

/// Initialize logging with a specific level.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_with_level(level: &str) {
    // SAFETY: This should only be called at program startup before threads are spawned.
    unsafe {
        env::set_var("TABULA_LOG_LEVEL", level);
    }
    init();
}

/// Initialize logging for debugging.
///
/// Equivalent to setting `TABULA_DEBUG=true` and calling `init()`.
///
/// # Safety
///
/// This function modifies environment variables, which is unsafe in
/// multi-threaded programs. Call this early in your program before
/// spawning threads.
pub fn init_debug() {
    // SAFETY: This should only be called at program startup before threads are spawned.
    unsafe {
        env::set_var("TABULA_DEBUG", "true");
    }
    init();
}

#[allow(unused_variables)]
fn install(level: &'static str, format: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "tabula={level},tabula_schema={level},tabula_relation={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match format {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .try_init()
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .try_init()
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .try_init()
                }
            };

            // A subscriber installed by the host application wins.
            if installed.is_ok() {
                tracing::info!(level, format, "Tabula logging initialized");
            }
        }
    });
}

/// Debug-level event, emitted only when `TABULA_DEBUG` is enabled.
#[macro_export]
macro_rules! tabula_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace-level event, emitted only when `TABULA_DEBUG` is enabled.
#[macro_export]
macro_rules! tabula_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_disabled_by_default() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("TABULA_DEBUG");
        }
        assert!(!is_debug_enabled());
    }

    #[test]
    fn test_log_level_default() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("TABULA_DEBUG");
            env::remove_var("TABULA_LOG_LEVEL");
        }
        assert_eq!(get_log_level(), "warn");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_level("TRACE"), Some("trace"));
        assert_eq!(normalize_level("loud"), None);
        assert_eq!(normalize_format("Pretty"), "pretty");
        assert_eq!(normalize_format("xml"), "json");
    }
}
