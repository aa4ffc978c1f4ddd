//! YAML configuration file
//!
//! ```yaml
//! model:
//!   provider: deepseek
//!   model: deepseek-chat
//!   temperature: 0.2
//! tool_server:
//!   kind: rpc
//!   endpoint: tcp://127.0.0.1:8080
//! session:
//!   max_turns: 10
//!   tool_timeouts_ms:
//!     run_shell: 60000
//! ```
//!
//! Every field is optional; missing fields take their defaults.
//!
//! Several servers can be listed under `tool_servers` instead; tool calls
//! are then routed to whichever server lists the tool:
//!
//! ```yaml
//! tool_servers:
//!   - name: builtin
//!     endpoint: tcp://127.0.0.1:8080
//!   - name: files
//!     kind: stdio
//!     command: npx
//!     args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
//!     env:
//!       NODE_ENV: production
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::{ProviderModelConfig, StreamChatOptions};
use crate::rpc::{Endpoint, ReconnectPolicy};
use crate::tools::ToolFilter;
use crate::types::ToolSchema;
use super::error::{ConfigError, ConfigResult};

const APP_DIR: &str = "toolloop";
const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant. Use the available tools to look up the \
weather, run shell commands or read the current time when that helps answer the user's question. \
Answer concisely once you have the information you need.";

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (`<config_dir>/toolloop/config.yaml`)
    User,
    /// Workspace-level config (`.config/toolloop/config.yaml` in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }

    /// Path of the config file at this level
    pub fn path(&self, workspace_root: &Path) -> PathBuf {
        match self {
            ConfigLevel::User => {
                // XDG config directory (~/.config on Linux, ~/Library/Application Support on macOS)
                let config_dir = dirs::config_dir()
                    .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
                config_dir.join(APP_DIR).join(CONFIG_FILE)
            }
            ConfigLevel::Workspace => workspace_root.join(".config").join(APP_DIR).join(CONFIG_FILE),
        }
    }
}

/// Model section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// genai provider id, or "mock"
    pub provider: String,
    pub model: String,
    /// Custom OpenAI-compatible endpoint
    pub api_base: Option<String>,
    /// Explicit key; otherwise the provider's environment variable is used
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            api_base: None,
            api_key: None,
            temperature: Some(0.2),
            top_p: Some(0.9),
            max_tokens: Some(4096),
        }
    }
}

impl ModelSettings {
    pub fn model_config(&self) -> ProviderModelConfig {
        ProviderModelConfig {
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
        }
    }

    /// Request options advertising `tools`
    pub fn chat_options(&self, tools: Vec<ToolSchema>) -> StreamChatOptions {
        StreamChatOptions {
            tools,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

/// Protocol spoken by the tool server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolServerKind {
    /// Framed JSON-RPC
    #[default]
    Rpc,
    /// Model Context Protocol
    Mcp,
    /// Model Context Protocol over the stdio of a spawned process
    Stdio,
}

/// Tool server section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolServerSettings {
    /// Name used in logs and errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: ToolServerKind,
    /// `tcp://host:port`, `unix:/path`, or `http(s)://` for MCP
    pub endpoint: String,
    /// Program to spawn for `stdio` servers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the spawned program
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    pub connect_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for ToolServerSettings {
    fn default() -> Self {
        Self {
            name: None,
            kind: ToolServerKind::Rpc,
            endpoint: "tcp://127.0.0.1:8080".to_string(),
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            connect_attempts: 3,
            backoff_ms: 200,
        }
    }
}

impl ToolServerSettings {
    /// Configured name, else the endpoint or command
    pub fn label(&self) -> &str {
        match (&self.name, self.kind, &self.command) {
            (Some(name), _, _) => name,
            (None, ToolServerKind::Stdio, Some(command)) => command,
            _ => &self.endpoint,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self.kind {
            ToolServerKind::Rpc => {
                Endpoint::parse(&self.endpoint).map_err(|e| format!("endpoint: {}", e))?;
            }
            ToolServerKind::Mcp => {
                let endpoint = self.endpoint.as_str();
                if !["http://", "https://", "unix:"].iter().any(|p| endpoint.starts_with(p)) {
                    return Err(format!("endpoint: unsupported MCP endpoint {}", endpoint));
                }
            }
            ToolServerKind::Stdio => {
                if self.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
                    return Err("command is required for stdio servers".to_string());
                }
            }
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.connect_attempts.max(1),
            initial_backoff: Duration::from_millis(self.backoff_ms),
            ..Default::default()
        }
    }
}

/// Session section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// System prompt
    pub instructions: String,
    /// Model rounds allowed per question
    pub max_turns: usize,
    /// Wall-clock limit per question
    pub deadline_secs: Option<u64>,
    /// Timeout for tools without their own default
    pub default_tool_timeout_ms: u64,
    /// Per-tool timeout overrides
    pub tool_timeouts_ms: HashMap<String, u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_turns: 10,
            deadline_secs: None,
            default_tool_timeout_ms: 30_000,
            tool_timeouts_ms: HashMap::new(),
        }
    }
}

impl SessionSettings {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn default_tool_timeout(&self) -> Duration {
        Duration::from_millis(self.default_tool_timeout_ms)
    }

    /// Configured override for one tool
    pub fn tool_timeout(&self, name: &str) -> Option<Duration> {
        self.tool_timeouts_ms.get(name).copied().map(Duration::from_millis)
    }
}

/// Tools section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Build the registry from the server's tool listing instead of the built-in set
    pub discover: bool,
    /// If set, only advertise these tools
    pub include: Option<Vec<String>>,
    /// Never advertise these tools
    pub exclude: Vec<String>,
}

impl ToolSettings {
    pub fn filter(&self) -> ToolFilter {
        let mut filter = ToolFilter::new().with_exclude(self.exclude.iter().cloned());
        if let Some(include) = &self.include {
            filter = filter.with_include(include.iter().cloned());
        }
        filter
    }
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: ModelSettings,
    pub tool_server: ToolServerSettings,
    /// Replaces `tool_server` when not empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_servers: Vec<ToolServerSettings>,
    pub session: SessionSettings,
    pub tools: ToolSettings,
}

impl AgentConfig {
    /// Tool servers to connect to
    pub fn servers(&self) -> &[ToolServerSettings] {
        if self.tool_servers.is_empty() {
            std::slice::from_ref(&self.tool_server)
        } else {
            &self.tool_servers
        }
    }

    /// Load from a file that must exist
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from a file, falling back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Workspace config if present, else user config, else defaults
    pub fn discover(workspace_root: impl AsRef<Path>) -> ConfigResult<(Self, Option<ConfigLevel>)> {
        for level in [ConfigLevel::Workspace, ConfigLevel::User] {
            let path = level.path(workspace_root.as_ref());
            if path.exists() {
                return Ok((Self::load(&path)?, Some(level)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        // An empty file is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Check values serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model.model must not be empty".to_string()));
        }
        if self.session.max_turns == 0 {
            return Err(ConfigError::Invalid("session.max_turns must be at least 1".to_string()));
        }
        if self.tool_servers.is_empty() {
            self.tool_server
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("tool_server.{}", e)))?;
        }

        let mut labels = HashSet::new();
        for (i, server) in self.tool_servers.iter().enumerate() {
            server
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("tool_servers[{}].{}", i, e)))?;
            if !labels.insert(server.label()) {
                return Err(ConfigError::Invalid(format!(
                    "tool_servers: duplicate server {}",
                    server.label()
                )));
            }
        }
        Ok(())
    }
}
