//! Model stream errors
//!
//! Every variant ends the session: the agent loop reports it as
//! `AbortReason::Model`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The request was refused before any output
    #[error("{provider} API error ({status}): {message}")]
    ApiError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} rate limited: {message}")]
    RateLimited { provider: String, message: String },

    /// The stream broke after it started
    #[error("{provider} stream failed: {message}")]
    Stream { provider: String, message: String },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Error for a refused request; 429 becomes `RateLimited`
    pub fn api_error(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        if status == 429 {
            return Self::RateLimited { provider, message };
        }
        Self::ApiError {
            provider,
            status,
            message,
        }
    }

    pub fn stream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the same request may succeed if sent again later
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::Stream { .. } => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
