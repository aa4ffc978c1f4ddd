//! Logger backed by the `tracing` crate
//!
//! The subscriber (format, filter, output) is installed by the binary;
//! library code only emits events.

use super::traits::{LogLevel, Logger};

/// Forwards log calls to `tracing` events, tagged with a component name
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: &'static str,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("toolloop")
    }
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(component = self.component, "{}", message),
            LogLevel::Info => tracing::info!(component = self.component, "{}", message),
            LogLevel::Warn => tracing::warn!(component = self.component, "{}", message),
            LogLevel::Error => tracing::error!(component = self.component, "{}", message),
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => tracing::enabled!(tracing::Level::DEBUG),
            LogLevel::Info => tracing::enabled!(tracing::Level::INFO),
            LogLevel::Warn => tracing::enabled!(tracing::Level::WARN),
            LogLevel::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
}
