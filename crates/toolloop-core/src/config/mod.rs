//! Agent configuration
//!
//! One YAML file with model, tool server, session and tool sections.
//! Lookup order: explicit path, workspace-level
//! (`.config/toolloop/config.yaml`), user-level
//! (`<config_dir>/toolloop/config.yaml`), built-in defaults.

mod error;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{
    AgentConfig, ConfigLevel, ModelSettings, SessionSettings, ToolServerKind, ToolServerSettings, ToolSettings,
};
