//! Adapter between toolloop types and genai types
//!
//! Conversion functions between the conversation history / tool schemas used
//! by the agent loop and genai's request and stream types.

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions, ChatStreamEvent, Tool as GenaiTool,
    ToolCall as GenaiToolCall, ToolResponse as GenaiToolResponse,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};
use serde_json::{json, Value};

use crate::types::{ConversationTurn, StreamChunk, ToolCall, ToolSchema, TurnRole};

use super::error::ProviderError;
use super::traits::{ProviderModelConfig, StreamChatOptions};

// ============================================================================
// History Conversion: toolloop -> genai
// ============================================================================

fn to_genai_tool_call(call: &ToolCall) -> Result<GenaiToolCall, serde_json::Error> {
    serde_json::from_value(json!({
        "call_id": call.id,
        "fn_name": call.name,
        "fn_arguments": call.input,
    }))
}

/// Convert one history turn to a genai message
pub fn to_genai_message(turn: &ConversationTurn) -> GenaiMessage {
    match turn.role {
        TurnRole::System => GenaiMessage::system(turn.content.clone()),
        TurnRole::User => GenaiMessage::user(turn.content.clone()),
        TurnRole::Assistant if turn.has_tool_calls() => {
            match turn.tool_calls.iter().map(to_genai_tool_call).collect::<Result<Vec<_>, _>>() {
                Ok(calls) => GenaiMessage::from(calls),
                Err(_) => GenaiMessage::assistant(turn.content.clone()),
            }
        }
        TurnRole::Assistant => GenaiMessage::assistant(turn.content.clone()),
        TurnRole::ToolResult => GenaiMessage::from(GenaiToolResponse::new(
            turn.tool_call_id.clone().unwrap_or_default(),
            turn.content.clone(),
        )),
    }
}

/// Convert the history to genai messages
///
/// An assistant turn with both text and tool calls becomes a text message
/// followed by the tool-call message.
pub fn to_genai_messages(history: &[ConversationTurn]) -> Vec<GenaiMessage> {
    let mut messages = Vec::with_capacity(history.len());
    for turn in history {
        if turn.role == TurnRole::Assistant && turn.has_tool_calls() && !turn.content.is_empty() {
            messages.push(GenaiMessage::assistant(turn.content.clone()));
        }
        messages.push(to_genai_message(turn));
    }
    messages
}

// ============================================================================
// Tool Conversion: toolloop -> genai
// ============================================================================

/// Convert a tool schema to a genai Tool
pub fn to_genai_tool(tool: &ToolSchema) -> GenaiTool {
    GenaiTool::new(&tool.name)
        .with_description(&tool.description)
        .with_schema(tool.input_schema.clone())
}

/// Convert tool schemas to genai tools
pub fn to_genai_tools(tools: &[ToolSchema]) -> Vec<GenaiTool> {
    tools.iter().map(to_genai_tool).collect()
}

// ============================================================================
// Options Conversion: toolloop -> genai
// ============================================================================

/// Convert StreamChatOptions to genai ChatOptions
pub fn to_genai_options(options: &StreamChatOptions) -> GenaiOptions {
    let mut genai_opts = GenaiOptions::default();

    if let Some(temp) = options.temperature {
        genai_opts = genai_opts.with_temperature(temp as f64);
    }

    if let Some(top_p) = options.top_p {
        genai_opts = genai_opts.with_top_p(top_p as f64);
    }

    if let Some(max_tokens) = options.max_tokens {
        genai_opts = genai_opts.with_max_tokens(max_tokens);
    }

    // Capture tool calls in stream so we can return them
    genai_opts.with_capture_tool_calls(true)
}

// ============================================================================
// Response Conversion: genai -> toolloop
// ============================================================================

/// Convert genai ToolCall to a ToolCall
pub fn from_genai_tool_call(tc: &GenaiToolCall) -> ToolCall {
    ToolCall::new(tc.call_id.clone(), tc.fn_name.clone(), tc.fn_arguments.clone())
}

/// Turns genai's per-chunk tool calls into argument deltas
///
/// With call capture enabled genai reports each tool call chunk as the call
/// accumulated so far. The tracker remembers what was already forwarded per
/// call id and emits only the new suffix, with the name on the first
/// fragment. The calls captured at `End` are forwarded whole; the
/// reassembler drops those it already completed from fragments.
#[derive(Debug, Default)]
pub struct ToolChunkTracker {
    /// (call id, arguments forwarded so far) in first-seen order
    seen: Vec<(String, String)>,
}

impl ToolChunkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta chunk for one genai tool call chunk, if it carries anything new
    pub fn delta(&mut self, tc: &GenaiToolCall) -> Option<StreamChunk> {
        let arguments = match &tc.fn_arguments {
            Value::String(raw) => raw.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        let position = self.seen.iter().position(|(id, _)| *id == tc.call_id);
        let (index, first) = match position {
            Some(position) => (position, false),
            None => {
                self.seen.push((tc.call_id.clone(), String::new()));
                (self.seen.len() - 1, true)
            }
        };

        let forwarded = &mut self.seen[index].1;
        let suffix = match arguments.strip_prefix(forwarded.as_str()) {
            Some(rest) => rest.to_string(),
            // Not cumulative: the chunk is itself the delta
            None => arguments,
        };
        forwarded.push_str(&suffix);

        let name = Some(tc.fn_name.clone()).filter(|n| first && !n.is_empty());
        if !first && suffix.is_empty() {
            return None;
        }

        Some(StreamChunk::ToolCallDelta {
            id: tc.call_id.clone(),
            index: index as u32,
            name,
            input_delta: Some(suffix).filter(|s| !s.is_empty()),
        })
    }
}

/// Convert a genai stream event to zero or more chunks
pub fn from_genai_event(
    event: ChatStreamEvent,
    tracker: &mut ToolChunkTracker,
) -> Vec<Result<StreamChunk, ProviderError>> {
    match event {
        ChatStreamEvent::Chunk(chunk) => vec![Ok(StreamChunk::text(chunk.content))],
        ChatStreamEvent::ToolCallChunk(chunk) => tracker.delta(&chunk.tool_call).map(Ok).into_iter().collect(),
        ChatStreamEvent::End(end) => end
            .captured_tool_calls()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| Ok(StreamChunk::tool_call(from_genai_tool_call(tc))))
                    .collect()
            })
            .unwrap_or_default(),
        ChatStreamEvent::Start | ChatStreamEvent::ReasoningChunk(_) | ChatStreamEvent::ThoughtSignatureChunk(_) => {
            Vec::new()
        }
    }
}

// ============================================================================
// Provider Resolution
// ============================================================================

/// Provider configuration for routing
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider identifier (e.g., "deepseek", "openai", "openrouter")
    pub provider: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, model: &ProviderModelConfig) -> Self {
        Self {
            provider: provider.into(),
            api_key: model.api_key.clone(),
            api_base: model.api_base.clone(),
        }
    }
}

// ============================================================================
// Client Creation with Custom Auth
// ============================================================================

/// Create a genai Client with explicit auth and endpoint resolution
///
/// Without an explicit key, genai's own environment lookup applies
/// (e.g. `DEEPSEEK_API_KEY`).
pub fn create_client(config: &ProviderConfig) -> Client {
    let mut builder = Client::builder();

    if let Some(key) = config.api_key.clone() {
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(key.clone())))
            },
        );
        builder = builder.with_auth_resolver(auth_resolver);
    }

    let target_provider = config.provider.to_lowercase();
    let target_api_base = config.api_base.clone();

    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let native = is_genai_native(&target_provider);

            let endpoint = match (&target_api_base, target_provider.as_str()) {
                (Some(base), _) => Endpoint::from_owned(base.clone()),
                (None, "openrouter") => Endpoint::from_static("https://openrouter.ai/api/v1/"),
                (None, "mistral") => Endpoint::from_static("https://api.mistral.ai/v1/"),
                // Native genai providers - let it resolve normally
                (None, _) => return Ok(target),
            };

            // Custom endpoints of non-native providers speak the OpenAI protocol
            let adapter_kind = if native {
                target.model.adapter_kind
            } else {
                AdapterKind::OpenAI
            };

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: ModelIden::new(adapter_kind, target.model.model_name.clone()),
            })
        },
    );

    builder.with_service_target_resolver(target_resolver).build()
}

/// Check if a provider is natively supported by genai
pub fn is_genai_native(provider: &str) -> bool {
    matches!(
        provider.to_lowercase().as_str(),
        "openai"
            | "anthropic"
            | "gemini"
            | "ollama"
            | "groq"
            | "xai"
            | "deepseek"
            | "cohere"
            | "fireworks"
            | "together"
            | "nebius"
            | "mimo"
            | "zai"
            | "bigmodel"
    )
}

/// Check if a provider can be handled by genai (native or via OpenAI-compat)
pub fn is_genai_supported(provider: &str) -> bool {
    is_genai_native(provider) || matches!(provider.to_lowercase().as_str(), "openrouter" | "mistral")
}
