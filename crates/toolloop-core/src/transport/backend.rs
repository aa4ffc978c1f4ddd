//! Backend seam between the transport and a concrete tool server client

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolDescriptor;

/// How a remote call failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The server could not be reached or the connection broke
    #[error("Tool server unavailable: {0}")]
    Unavailable(String),

    /// The tool ran and reported a failure
    #[error("{0}")]
    Execution(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// A client able to run tools on a remote server
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Backend name for logs ("rpc", "mcp")
    fn name(&self) -> &str;

    /// Run `name` with `arguments`, returning the tool's JSON result
    async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value>;

    /// Descriptors of every tool the server exposes
    async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>>;
}
