//! Tool/function calling types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool schema advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (function name)
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id for this tool call
    pub id: String,
    /// Name of the tool being called
    pub name: String,
    /// Input arguments for the tool (a JSON object)
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Get an input argument by key
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// Get an input argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

/// Why a tool call produced no success payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Arguments did not match the declared parameters
    SchemaError,
    /// No tool with that name is registered
    UnknownTool,
    /// The tool server could not be reached
    TransportUnavailable,
    /// No response before the invocation's timeout
    Timeout,
    /// The tool ran and reported an error
    ToolExecutionError,
    /// The session was cancelled while the call was outstanding
    Cancelled,
    /// Argument fragments never formed a complete payload
    IncompleteToolCall,
    /// Tool-call fragment without a preceding name-bearing fragment
    OrphanFragment,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SchemaError => "schema_error",
            FailureKind::UnknownTool => "unknown_tool",
            FailureKind::TransportUnavailable => "transport_unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::ToolExecutionError => "tool_execution_error",
            FailureKind::Cancelled => "cancelled",
            FailureKind::IncompleteToolCall => "incomplete_tool_call",
            FailureKind::OrphanFragment => "orphan_fragment",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure descriptor of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: Value },
    Failure(ToolFailure),
}

/// Result of one tool call, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is responding to
    #[serde(rename = "callId")]
    pub call_id: String,
    /// Success payload or failure descriptor
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Success { payload },
        }
    }

    /// Create a failed tool result
    pub fn failure(call_id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure(ToolFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure(_))
    }

    /// Failure kind, if this result is a failure
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            ToolOutcome::Failure(f) => Some(f.kind),
            ToolOutcome::Success { .. } => None,
        }
    }

    /// Render the result as the text the model sees
    pub fn render(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { payload: Value::String(s) } => s.clone(),
            ToolOutcome::Success { payload } => payload.to_string(),
            ToolOutcome::Failure(f) => format!("Error [{}]: {}", f.kind, f.message),
        }
    }
}

/// Tool choice option for requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Let the model decide whether to use tools
    #[default]
    Auto,
    /// Don't use tools
    None,
    /// Force tool use
    Required,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_args() {
        let call = ToolCall::new("call_123", "get_weather", json!({"city": "Paris"}));

        assert_eq!(call.get_arg_str("city"), Some("Paris"));
        assert_eq!(call.get_arg_str("nonexistent"), None);
    }

    #[test]
    fn test_tool_result() {
        let success = ToolResult::success("call_123", json!({"weather": "sunny"}));
        assert!(!success.is_error());
        assert_eq!(success.failure_kind(), None);
        assert_eq!(success.render(), r#"{"weather":"sunny"}"#);

        let error = ToolResult::failure("call_456", FailureKind::Timeout, "no response after 5s");
        assert!(error.is_error());
        assert_eq!(error.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(error.render(), "Error [timeout]: no response after 5s");
    }

    #[test]
    fn test_string_payload_renders_verbatim() {
        let result = ToolResult::success("c", json!("plain text"));
        assert_eq!(result.render(), "plain text");
    }

    #[test]
    fn test_outcome_serialization() {
        let result = ToolResult::failure("c1", FailureKind::Cancelled, "session cancelled");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["callId"], "c1");
        assert_eq!(json["outcome"]["status"], "failure");
        assert_eq!(json["outcome"]["kind"], "cancelled");
    }
}
