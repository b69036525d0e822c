#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! Library code never installs a logger. Components receive a [`Logger`]
//! handle at construction and log through the `snap_*` macros, which prefix
//! every line with the handle's scope (for example `[MUSINSA/stager]`).
//! The binary owns the process-wide sink.

use std::fmt;
use std::sync::Arc;

/// A cheap, cloneable logging handle carrying a scope label.
#[derive(Clone, PartialEq, Eq)]
pub struct Logger {
    scope: Arc<str>,
}

impl Logger {
    /// Creates a root handle, typically named after a source.
    pub fn new(scope: impl AsRef<str>) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// Derives a handle for a sub-component: `parent/name`.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}/{}", self.scope, name))
    }

    /// The scope label printed in front of every message.
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("harvester")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Logger({})", self.scope)
    }
}

/// Logs a trace-level message through the given [`Logger`] handle.
#[macro_export]
macro_rules! snap_trace {
    ($logger:expr, $($arg:tt)*) => {{
        log::trace!("[{}] {}", $logger.scope(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message through the given [`Logger`] handle.
#[macro_export]
macro_rules! snap_debug {
    ($logger:expr, $($arg:tt)*) => {{
        log::debug!("[{}] {}", $logger.scope(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message through the given [`Logger`] handle.
#[macro_export]
macro_rules! snap_info {
    ($logger:expr, $($arg:tt)*) => {{
        log::info!("[{}] {}", $logger.scope(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message through the given [`Logger`] handle.
#[macro_export]
macro_rules! snap_warn {
    ($logger:expr, $($arg:tt)*) => {{
        log::warn!("[{}] {}", $logger.scope(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message through the given [`Logger`] handle.
#[macro_export]
macro_rules! snap_error {
    ($logger:expr, $($arg:tt)*) => {{
        log::error!("[{}] {}", $logger.scope(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
