//! Logger trait and format macros

use std::fmt;
use std::sync::Arc;

/// Severity of a log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink every component writes its diagnostics to
///
/// Implementors provide `log`; the per-level helpers forward to it.
/// `enabled` lets the `log_*!` macros skip formatting for muted levels.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Loggers are shared between the agent, transports and spawned tasks
pub type SharedLogger = Arc<dyn Logger>;

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($logger:expr, $level:expr, $($arg:tt)*) => {{
        let logger = &$logger;
        if logger.enabled($level) {
            logger.log($level, &format!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!($logger, $crate::logging::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!($logger, $crate::logging::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!($logger, $crate::logging::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::__log_at!($logger, $crate::logging::LogLevel::Error, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        min: Option<LogLevel>,
        lines: Mutex<Vec<String>>,
    }

    impl Logger for Capture {
        fn log(&self, level: LogLevel, message: &str) {
            self.lines.lock().push(format!("{} {}", level, message));
        }

        fn enabled(&self, level: LogLevel) -> bool {
            self.min.map_or(true, |min| level >= min)
        }
    }

    #[test]
    fn test_level_helpers_forward_to_log() {
        let logger = Capture::default();
        logger.info("ready");
        logger.error("boom");
        assert_eq!(*logger.lines.lock(), vec!["info ready", "error boom"]);
    }

    #[test]
    fn test_macros_skip_muted_levels() {
        let logger = Capture {
            min: Some(LogLevel::Warn),
            ..Default::default()
        };
        crate::log_debug!(logger, "hidden {}", 1);
        crate::log_warn!(logger, "shown {}", 2);
        assert_eq!(*logger.lines.lock(), vec!["warn shown 2"]);
    }

    #[test]
    fn test_macros_accept_shared_logger() {
        let logger: SharedLogger = Arc::new(Capture::default());
        crate::log_info!(logger, "value {}", 3);
    }
}
