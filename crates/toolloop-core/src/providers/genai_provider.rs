//! GenaiProvider - Unified provider using the genai crate
//!
//! Handles all genai-supported providers (DeepSeek, OpenAI, Anthropic, ...)
//! as well as OpenAI-compatible endpoints via the ServiceTargetResolver.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::Arc;

use genai::chat::{ChatRequest, ChatStreamEvent};

use crate::logging::Logger;
use crate::types::{CancellationToken, ConversationTurn};

use super::error::{ProviderError, ProviderResult};
use super::genai_adapter::{
    create_client, from_genai_event, is_genai_supported, to_genai_messages, to_genai_options, to_genai_tools,
    ProviderConfig, ToolChunkTracker,
};
use super::traits::{Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};

/// Unified provider using genai for all supported LLM APIs
pub struct GenaiProvider {
    /// Provider identifier
    provider_id: String,
    /// Logger for debug output
    logger: Arc<dyn Logger>,
}

impl GenaiProvider {
    /// Create a new GenaiProvider
    pub fn new(provider_id: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            provider_id: provider_id.into(),
            logger,
        }
    }

    /// Check if this provider can handle the given provider ID
    pub fn supports(provider_id: &str) -> bool {
        is_genai_supported(provider_id)
    }

    /// Extract model name from a model string (e.g., "openai/gpt-4" -> "gpt-4")
    pub fn extract_model_name(model: &str) -> &str {
        model.split('/').nth(1).unwrap_or(model)
    }
}

#[async_trait]
impl Provider for GenaiProvider {
    fn name(&self) -> &str {
        &self.provider_id
    }

    async fn stream_chat(
        &self,
        history: &[ConversationTurn],
        model_config: &ProviderModelConfig,
        options: &StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<StreamResponse> {
        self.logger.info(&format!(
            "[GenaiProvider] stream_chat called: provider={}, model={}, turns={}",
            self.provider_id,
            model_config.model,
            history.len()
        ));

        let client = create_client(&ProviderConfig::new(&self.provider_id, model_config));

        let mut chat_req = ChatRequest::new(to_genai_messages(history));
        let tools = options.advertised_tools();
        if !tools.is_empty() {
            chat_req = chat_req.with_tools(to_genai_tools(tools));
        }

        let genai_options = to_genai_options(options);

        // Extract model name (remove provider prefix if present)
        let model_name = Self::extract_model_name(&model_config.model);

        let chat_stream = client
            .exec_chat_stream(model_name, chat_req, Some(&genai_options))
            .await
            .map_err(|e| ProviderError::api_error(&self.provider_id, 500, e.to_string()))?;

        self.logger.debug("[GenaiProvider] Stream started successfully");

        let logger = Arc::clone(&self.logger);
        let provider_id = self.provider_id.clone();
        let mut tracker = ToolChunkTracker::new();

        let chunks = chat_stream.stream.flat_map(move |result| {
            let items = if cancel_token.is_cancelled() {
                logger.info("[GenaiProvider] Stream cancelled");
                vec![Err(ProviderError::Cancelled)]
            } else {
                match result {
                    Ok(event) => {
                        if let ChatStreamEvent::End(_) = &event {
                            logger.debug("[GenaiProvider] Stream event: End");
                        }
                        from_genai_event(event, &mut tracker)
                    }
                    Err(e) => {
                        logger.error(&format!("[GenaiProvider] Stream error: {}", e));
                        vec![Err(ProviderError::stream(&provider_id, e.to_string()))]
                    }
                }
            };
            stream::iter(items)
        });

        Ok(Box::pin(chunks))
    }
}
