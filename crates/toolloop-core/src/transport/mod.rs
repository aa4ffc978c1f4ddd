//! Tool transport: validated, time-bounded, cancellable invocation
//!
//! ```text
//! ToolCall ──► ToolRegistry::validate ──► ToolBackend::call_tool ──► ToolResult
//!                  │ unknown / bad args        │ raced against timeout + cancel
//!                  ▼                            ▼
//!             failure result             Timeout | Cancelled | TransportUnavailable
//!                                        | ToolExecutionError | success
//! ```
//!
//! Every outcome is a `ToolResult` carrying the originating call id; the
//! transport itself never fails.

mod backend;
mod connect;
mod router;

pub use backend::{BackendError, BackendResult, ToolBackend};
pub use connect::{connect_backend, connect_backends};
pub use router::RoutedBackend;

use std::sync::Arc;
use std::time::Duration;

use crate::logging::{Logger, SharedLogger};
use crate::tools::ToolRegistry;
use crate::types::{CancellationToken, FailureKind, ToolCall, ToolResult};
use crate::{log_debug, log_warn};

/// Timeout used when neither the caller nor the descriptor sets one
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Invokes tools on a remote backend on behalf of the agent loop
pub struct ToolTransport {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn ToolBackend>,
    default_timeout: Duration,
    logger: SharedLogger,
}

impl ToolTransport {
    pub fn new(registry: Arc<ToolRegistry>, backend: Arc<dyn ToolBackend>, logger: SharedLogger) -> Self {
        Self {
            registry,
            backend,
            default_timeout: DEFAULT_TOOL_TIMEOUT,
            logger,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invoke one tool call
    ///
    /// Timeouts are not retried. On cancellation the transport stops waiting;
    /// the remote side may still finish the work.
    pub async fn invoke(&self, call: &ToolCall, timeout: Option<Duration>, cancel: CancellationToken) -> ToolResult {
        let descriptor = match self.registry.validate(&call.name, &call.input) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log_warn!(self.logger, "Rejected tool call {} ({}): {}", call.id, call.name, e);
                return ToolResult::failure(&call.id, e.failure_kind(), e.to_string());
            }
        };

        if cancel.is_cancelled() {
            return ToolResult::failure(&call.id, FailureKind::Cancelled, "cancelled before dispatch");
        }

        let timeout = timeout
            .or(descriptor.handle.timeout)
            .unwrap_or(self.default_timeout);

        log_debug!(
            self.logger,
            "Invoking {} via {} (id {}, timeout {:?})",
            descriptor.handle.remote_name,
            self.backend.name(),
            call.id,
            timeout
        );

        let remote = self.backend.call_tool(&descriptor.handle.remote_name, call.input.clone());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_debug!(self.logger, "Tool call {} cancelled", call.id);
                ToolResult::failure(&call.id, FailureKind::Cancelled, "invocation cancelled")
            }
            _ = tokio::time::sleep(timeout) => {
                log_warn!(self.logger, "Tool call {} ({}) timed out after {:?}", call.id, call.name, timeout);
                ToolResult::failure(
                    &call.id,
                    FailureKind::Timeout,
                    format!("no response after {}ms", timeout.as_millis()),
                )
            }
            result = remote => match result {
                Ok(payload) => ToolResult::success(&call.id, payload),
                Err(BackendError::Unavailable(message)) => {
                    log_warn!(self.logger, "Tool server unavailable for {}: {}", call.id, message);
                    ToolResult::failure(&call.id, FailureKind::TransportUnavailable, message)
                }
                Err(BackendError::Execution(message)) => {
                    ToolResult::failure(&call.id, FailureKind::ToolExecutionError, message)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend whose behaviour is chosen by the tool name
    #[derive(Default)]
    struct FakeBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "get_weather" => Ok(json!({"city": arguments["city"], "weather": "sunny"})),
                "run_shell" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!({}))
                }
                "now_time" => Err(BackendError::Unavailable("connection refused".into())),
                _ => Err(BackendError::Execution("boom".into())),
            }
        }

        async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
            Ok(Vec::new())
        }
    }

    fn transport() -> (ToolTransport, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        let transport = ToolTransport::new(
            Arc::new(ToolRegistry::builtin()),
            backend.clone(),
            Arc::new(NoOpLogger),
        );
        (transport, backend)
    }

    #[tokio::test]
    async fn test_success() {
        let (transport, _) = transport();
        let call = ToolCall::new("call_1", "get_weather", json!({"city": "Paris"}));

        let result = transport.invoke(&call, None, CancellationToken::new()).await;
        assert_eq!(result.call_id, "call_1");
        assert!(matches!(
            result.outcome,
            crate::types::ToolOutcome::Success { ref payload } if payload["weather"] == "sunny"
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_backend() {
        let (transport, backend) = transport();
        let call = ToolCall::new("call_1", "launch_rocket", json!({}));

        let result = transport.invoke(&call, None, CancellationToken::new()).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::UnknownTool));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schema_error_never_reaches_backend() {
        let (transport, backend) = transport();
        let call = ToolCall::new("call_1", "get_weather", json!({"city": 7}));

        let result = transport.invoke(&call, None, CancellationToken::new()).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::SchemaError));
        assert!(result.render().contains("city"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let (transport, _) = transport();
        let call = ToolCall::new("slow", "run_shell", json!({"command": "sleep 100"}));

        let result = transport
            .invoke(&call, Some(Duration::from_millis(100)), CancellationToken::new())
            .await;
        assert_eq!(result.call_id, "slow");
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_descriptor_timeout_applies() {
        let (transport, _) = transport();
        let call = ToolCall::new("slow", "run_shell", json!({"command": "sleep 100"}));

        let started = tokio::time::Instant::now();
        let result = transport.invoke(&call, None, CancellationToken::new()).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (transport, _) = transport();
        let call = ToolCall::new("slow", "run_shell", json!({"command": "sleep 100"}));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = transport.invoke(&call, None, cancel).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn test_backend_failures() {
        let (transport, _) = transport();

        let result = transport
            .invoke(&ToolCall::new("t", "now_time", json!({})), None, CancellationToken::new())
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::TransportUnavailable));

        let mut registry = ToolRegistry::builtin();
        registry
            .register(ToolDescriptor::new("explode", "Always fails", Default::default()))
            .unwrap();
        let transport = ToolTransport::new(
            Arc::new(registry),
            Arc::new(FakeBackend::default()),
            Arc::new(NoOpLogger),
        );
        let result = transport
            .invoke(&ToolCall::new("e", "explode", json!({})), None, CancellationToken::new())
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::ToolExecutionError));
        assert_eq!(result.render(), "Error [tool_execution_error]: boom");
    }
}
