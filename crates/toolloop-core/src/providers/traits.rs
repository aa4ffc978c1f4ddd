//! Model stream source

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{CancellationToken, ConversationTurn, StreamChunk, ToolChoice, ToolSchema};
use super::error::ProviderResult;

/// Which model to call and how to authenticate
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderModelConfig {
    /// Model name; a `provider/` prefix is stripped
    pub model: String,
    /// Explicit key; `None` defers to the provider's environment variable
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL overriding the provider default
    pub api_base: Option<String>,
}

impl ProviderModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            api_base: None,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct StreamChatOptions {
    /// Tools advertised to the model
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// `None` withholds the tools from the request entirely
    pub tool_choice: ToolChoice,
}

impl StreamChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// Tools to send with the request, honouring `tool_choice`
    pub fn advertised_tools(&self) -> &[ToolSchema] {
        match self.tool_choice {
            ToolChoice::None => &[],
            ToolChoice::Auto | ToolChoice::Required => &self.tools,
        }
    }
}

/// Fragments of one model response
pub type StreamResponse = Pin<Box<dyn Stream<Item = ProviderResult<StreamChunk>> + Send>>;

/// Source of streamed model responses
///
/// The returned stream yields text and tool-call fragments in the order the
/// model produced them. Implementations stop with `ProviderError::Cancelled`
/// once `cancel_token` fires.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_chat(
        &self,
        history: &[ConversationTurn],
        model: &ProviderModelConfig,
        options: &StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<StreamResponse>;
}
