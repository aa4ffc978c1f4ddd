//! Logging abstractions
//!
//! Components receive an `Arc<dyn Logger>`; production code wires in
//! `TracingLogger`, tests use `NoOpLogger`.

mod traits;
mod noop;
mod tracing_logger;

pub use traits::{LogLevel, Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use tracing_logger::TracingLogger;
