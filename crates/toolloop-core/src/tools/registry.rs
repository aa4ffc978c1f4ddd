//! Tool registry: name → descriptor
//!
//! The registry is the local source of truth for:
//! - Which tools exist and how the transport reaches them
//! - The parameter schema each tool accepts
//! - The tool schemas advertised to the model
//!
//! It is built once and then shared read-only behind an `Arc`.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::types::{FailureKind, ToolSchema};
use super::builtin::BuiltinTool;
use super::schema::ParamSchema;

/// Registry-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateName(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    SchemaError { tool: String, message: String },
}

impl RegistryError {
    /// Failure kind used when this error becomes a tool result
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RegistryError::UnknownTool(_) => FailureKind::UnknownTool,
            RegistryError::SchemaError { .. } | RegistryError::DuplicateName(_) => FailureKind::SchemaError,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// How the transport reaches a tool's implementation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolHandle {
    /// Name of the tool on the remote server
    pub remote_name: String,
    /// Default invocation timeout for this tool
    pub timeout: Option<Duration>,
}

impl ToolHandle {
    pub fn new(remote_name: impl Into<String>) -> Self {
        Self {
            remote_name: remote_name.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Capability descriptor of one tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Tool name, unique within a registry
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Declared parameters
    pub params: ParamSchema,
    /// Invocation handle
    pub handle: ToolHandle,
}

impl ToolDescriptor {
    /// Create a descriptor whose remote name equals its name
    pub fn new(name: impl Into<String>, description: impl Into<String>, params: ParamSchema) -> Self {
        let name = name.into();
        Self {
            handle: ToolHandle::new(name.clone()),
            name,
            description: description.into(),
            params,
        }
    }

    pub fn with_handle(mut self, handle: ToolHandle) -> Self {
        self.handle = handle;
        self
    }

    /// Build from a tool listing entry (name, description, JSON Schema)
    pub fn from_listing(name: impl Into<String>, description: impl Into<String>, input_schema: &Value) -> Self {
        let mut descriptor = Self::new(name, description, ParamSchema::from_json_schema(input_schema));
        // Known tools keep their tuned timeouts even when discovered remotely
        if let Some(builtin) = BuiltinTool::from_name(&descriptor.name) {
            descriptor.handle.timeout = Some(builtin.default_timeout());
        }
        descriptor
    }

    /// Schema advertised to the model
    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.params.to_json_schema(),
        }
    }
}

/// Filter applied when building a registry from a remote listing
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// If set, only include tools with these names
    pub include: Option<HashSet<String>>,
    /// Exclude tools with these names
    pub exclude: HashSet<String>,
}

impl ToolFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include only specific tools
    pub fn with_include(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.include = Some(names.into_iter().collect());
        self
    }

    /// Exclude specific tools
    pub fn with_exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.exclude = names.into_iter().collect();
        self
    }

    /// Check if a tool name passes this filter
    pub fn matches(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }

        match self.include {
            Some(ref include) => include.contains(name),
            None => true,
        }
    }
}

/// Registry of available tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    /// Descriptors in registration order
    tools: Vec<ToolDescriptor>,
    /// Name → position in `tools`
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for tool in BuiltinTool::ALL {
            // Built-in names are distinct
            let _ = registry.register(tool.descriptor());
        }
        registry
    }

    /// Build a registry from discovered descriptors
    ///
    /// Later duplicates of a name are ignored.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>, filter: &ToolFilter) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors.into_iter().filter(|d| filter.matches(&d.name)) {
            let _ = registry.register(descriptor);
        }
        registry
    }

    /// Add a tool
    pub fn register(&mut self, descriptor: ToolDescriptor) -> RegistryResult<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> RegistryResult<&ToolDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Check an argument payload against a tool's declared parameters
    pub fn validate(&self, name: &str, arguments: &Value) -> RegistryResult<&ToolDescriptor> {
        let descriptor = self.resolve(name)?;
        descriptor
            .params
            .validate(arguments)
            .map_err(|message| RegistryError::SchemaError {
                tool: name.to_string(),
                message,
            })?;
        Ok(descriptor)
    }

    /// Tool schemas for sending to the model, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDescriptor::schema).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
