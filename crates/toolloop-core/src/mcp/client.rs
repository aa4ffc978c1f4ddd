//! MCP Client using the official rmcp SDK
//!
//! Connects to MCP servers over Unix socket or HTTP, or spawns them as child
//! processes speaking MCP on stdio.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, RawContent, Tool},
    service::RunningService,
    RoleClient,
};
use serde_json::Value;
use thiserror::Error;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::logging::Logger;
use crate::{log_debug, log_info};
use crate::tools::ToolDescriptor;
use crate::transport::{BackendError, BackendResult, ToolBackend};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type McpResult<T> = Result<T, McpError>;

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "toolloop".to_string(),
            title: Some("toolloop agent".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// MCP client, usable as a tool backend
pub struct McpClient {
    /// The underlying rmcp running service
    client: RunningService<RoleClient, ClientInfo>,
    /// Logger
    logger: Arc<dyn Logger>,
}

impl McpClient {
    /// Connect to an endpoint: `http(s)://...` or `unix:/path`
    pub async fn connect(endpoint: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Self::connect_http(endpoint, logger).await;
        }

        match endpoint.strip_prefix("unix://").or_else(|| endpoint.strip_prefix("unix:")) {
            #[cfg(unix)]
            Some(path) => Self::connect_unix(path, logger).await,
            _ => Err(McpError::ConnectionFailed(format!(
                "Unsupported MCP endpoint: {}",
                endpoint
            ))),
        }
    }

    /// Connect to an MCP server over a Unix socket
    #[cfg(unix)]
    pub async fn connect_unix<P: AsRef<Path>>(socket_path: P, logger: Arc<dyn Logger>) -> McpResult<Self> {
        let path = socket_path.as_ref();
        log_info!(logger, "[McpClient] Connecting to Unix socket: {:?}", path);

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| McpError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;
        let client = client_info()
            .serve(stream)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;
        Ok(Self::initialized(client, logger))
    }

    /// Connect to an MCP server over Streamable HTTP
    pub async fn connect_http(url: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        log_info!(logger, "[McpClient] Connecting to HTTP: {}", url);
        let client = client_info()
            .serve(StreamableHttpClientTransport::from_uri(url))
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;
        Ok(Self::initialized(client, logger))
    }

    /// Spawn `command` and speak MCP over its stdin and stdout
    ///
    /// The child is killed when the client is dropped.
    pub async fn spawn_stdio(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        use rmcp::transport::TokioChildProcess;

        log_info!(logger, "[McpClient] Spawning: {} {}", command, args.join(" "));
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args).envs(env);

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| McpError::ConnectionFailed(format!("{}: {}", command, e)))?;
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;
        Ok(Self::initialized(client, logger))
    }

    fn initialized(client: RunningService<RoleClient, ClientInfo>, logger: Arc<dyn Logger>) -> Self {
        if let Some(info) = client.peer_info() {
            log_info!(
                logger,
                "[McpClient] Initialized with {} {}",
                info.server_info.name,
                info.server_info.version
            );
        }
        Self { client, logger }
    }

    /// List all available tools
    pub async fn list_mcp_tools(&self) -> McpResult<Vec<Tool>> {
        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        log_debug!(self.logger, "[McpClient] Listed {} tools", result.tools.len());

        Ok(result.tools)
    }

    /// Call a tool by name
    pub async fn call_mcp_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        log_debug!(self.logger, "[McpClient] Calling tool: {}", name);

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        self.client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    /// Get server info
    pub fn server_info(&self) -> Option<&Implementation> {
        self.client.peer_info().map(|info| &info.server_info)
    }

    /// Close the connection
    pub async fn close(self) -> McpResult<()> {
        self.logger.info("[McpClient] Closing connection");
        self.client
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }
}

/// Convert an MCP tool listing into a descriptor
fn tool_descriptor(tool: &Tool) -> ToolDescriptor {
    let schema = Value::Object((*tool.input_schema).clone());
    ToolDescriptor::from_listing(
        tool.name.to_string(),
        tool.description.as_deref().unwrap_or_default(),
        &schema,
    )
}

/// Payload of a call result: structured content if present, else the text
/// blocks parsed as JSON when possible
fn result_payload(result: CallToolResult) -> BackendResult<Value> {
    let text = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error.unwrap_or(false) {
        return Err(BackendError::Execution(text));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[async_trait]
impl ToolBackend for McpClient {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value> {
        let result = self
            .call_mcp_tool(name, arguments)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        result_payload(result)
    }

    async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
        let tools = self
            .list_mcp_tools()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        Ok(tools.iter().map(tool_descriptor).collect())
    }
}
