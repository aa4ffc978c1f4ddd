//! toolloop core
//!
//! Agent tool-calling orchestration: a model streams a response, tool calls
//! are reassembled from its fragments, validated against a registry,
//! invoked on a remote tool server and fed back until the model answers.
//!
//! ## Components
//!
//! - `tools`: tool registry, parameter schemas and the built-in tool set
//! - `stream`: reassembles fragmented tool calls from a model stream
//! - `rpc`: framed JSON-RPC client with request correlation and reconnect
//! - `mcp`: MCP client for tool servers that speak the Model Context Protocol
//! - `transport`: validated, time-bounded, cancellable tool invocation
//! - `providers`: model stream sources (genai, mock)
//! - `agent`: the orchestration loop
//!
//! ```rust,ignore
//! use toolloop_core::{Agent, AgentConfig, CancellationToken, ToolRegistry, ToolTransport};
//!
//! let config = AgentConfig::load_or_default(path)?;
//! let backend = connect_backend(&config.tool_server, logger.clone()).await?;
//! let transport = Arc::new(ToolTransport::new(Arc::new(ToolRegistry::builtin()), backend, logger.clone()));
//! let provider = create_provider(&config.model.provider, logger.clone());
//!
//! let agent = Agent::from_config(&config, provider, transport, logger);
//! let outcome = agent.run("What's the weather in Paris?", CancellationToken::new(), None).await;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod tools;
pub mod stream;
pub mod rpc;
pub mod mcp;
pub mod transport;
pub mod providers;
pub mod agent;

// Re-export commonly used types
pub use types::{
    CancellationToken, ConversationHistory, ConversationTurn, FailureKind, StreamChunk, StreamEvent, ToolCall,
    ToolChoice, ToolOutcome, ToolResult, ToolSchema, TurnRole,
};

pub use logging::{LogLevel, Logger, NoOpLogger, SharedLogger, TracingLogger};

pub use config::{AgentConfig, ConfigError, ConfigResult, ToolServerKind};

pub use tools::{BuiltinTool, RegistryError, ToolDescriptor, ToolFilter, ToolRegistry};

pub use stream::{reassemble, StreamReassembler};

pub use rpc::{Endpoint, RpcClient, RpcError};

pub use mcp::{McpClient, McpError};

pub use transport::{connect_backend, connect_backends, BackendError, RoutedBackend, ToolBackend, ToolTransport};

pub use providers::{
    create_provider, GenaiProvider, MockProvider, Provider, ProviderError, ProviderModelConfig, StreamChatOptions,
};

pub use agent::{AbortReason, Agent, Phase, SessionEvent, SessionOutcome};
