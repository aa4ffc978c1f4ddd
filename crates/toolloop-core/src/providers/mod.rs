//! LLM Provider implementations
//!
//! This module contains the model stream source abstraction and its
//! implementations.
//!
//! ## Architecture
//!
//! Real providers go through the `genai` crate, which handles:
//! - Streaming SSE parsing
//! - Provider-specific protocols (DeepSeek, OpenAI, Anthropic, Gemini, etc.)
//! - Tool calling
//!
//! OpenAI-compatible endpoints not native to genai are routed through
//! genai's `ServiceTargetResolver` with a custom base URL.
//!
//! The `MockProvider` plays scripted rounds for tests and demos.

mod traits;
mod error;
mod genai_adapter;
mod genai_provider;
mod mock;

// Core traits and types
pub use traits::{Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};
pub use error::{ProviderError, ProviderResult};

// The main provider - handles all LLM providers via genai
pub use genai_provider::GenaiProvider;
pub use genai_adapter::{is_genai_native, is_genai_supported, ProviderConfig};

// Mock provider for testing
pub use mock::{MockConfig, MockMode, MockProvider, MockRound, MockStep};

use crate::logging::Logger;
use std::sync::Arc;

/// Create a provider for the given provider ID
///
/// `mock` yields an echoing `MockProvider`; anything else goes through
/// `GenaiProvider`, which treats unknown IDs as OpenAI-compatible endpoints.
pub fn create_provider(provider_id: &str, logger: Arc<dyn Logger>) -> Arc<dyn Provider> {
    match provider_id.to_lowercase().as_str() {
        "mock" => Arc::new(MockProvider::echo(logger)),
        _ => Arc::new(GenaiProvider::new(provider_id, logger)),
    }
}

/// List all supported provider IDs
pub fn supported_providers() -> Vec<&'static str> {
    vec![
        // Native genai providers
        "openai",
        "anthropic",
        "gemini",
        "ollama",
        "groq",
        "xai",
        "deepseek",
        "cohere",
        "fireworks",
        "together",
        "nebius",
        "mimo",
        "zai",
        "bigmodel",
        // OpenAI-compatible providers via resolver
        "openrouter",
        "mistral",
        // Testing
        "mock",
    ]
}
