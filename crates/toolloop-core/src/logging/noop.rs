//! Logger that discards everything

use super::traits::{LogLevel, Logger};

/// Used by tests and embedders that bring no logging of their own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}
