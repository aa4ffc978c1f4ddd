//! RPC error types

use thiserror::Error;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    #[error("Tool server unavailable: {0}")]
    Unavailable(String),
}

impl RpcError {
    /// Whether the error means the server could not be reached
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RpcError::ConnectionFailed(_) | RpcError::Io(_) | RpcError::ConnectionLost | RpcError::Unavailable(_)
        )
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
