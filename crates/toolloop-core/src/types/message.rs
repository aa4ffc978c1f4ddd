//! Conversation turn types

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolResult};

/// Role of a turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    System,
    User,
    Assistant,
    /// Result of a tool invocation, correlated to an assistant tool call
    ToolResult,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
            TurnRole::ToolResult => write!(f, "tool_result"),
        }
    }
}

/// One message-equivalent unit of a conversation
///
/// `tool_calls` is only populated on assistant turns and `tool_call_id`
/// only on tool-result turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced this turn
    pub role: TurnRole,
    /// Text content (may be empty)
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by the assistant in this turn
    #[serde(rename = "toolCalls", default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation id of the tool call this turn answers
    #[serde(rename = "toolCallId", default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    fn with_role(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(TurnRole::System, content)
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(TurnRole::User, content)
    }

    /// Create an assistant turn without tool calls
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(TurnRole::Assistant, content)
    }

    /// Create an assistant turn that requests tool calls
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(TurnRole::Assistant, content)
        }
    }

    /// Create a tool-result turn from a resolved tool result
    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            tool_call_id: Some(result.call_id.clone()),
            ..Self::with_role(TurnRole::ToolResult, result.render())
        }
    }

    /// Whether this is an assistant turn that requested at least one tool
    pub fn has_tool_calls(&self) -> bool {
        self.role == TurnRole::Assistant && !self.tool_calls.is_empty()
    }
}

/// Ordered, append-only list of turns
pub type ConversationHistory = Vec<ConversationTurn>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_creation() {
        let sys = ConversationTurn::system("You are helpful");
        assert_eq!(sys.role, TurnRole::System);
        assert_eq!(sys.content, "You are helpful");

        let user = ConversationTurn::user("Hello");
        assert_eq!(user.role, TurnRole::User);
        assert!(!user.has_tool_calls());

        let asst = ConversationTurn::assistant_with_calls(
            "",
            vec![ToolCall::new("call_1", "now_time", json!({}))],
        );
        assert!(asst.has_tool_calls());
    }

    #[test]
    fn test_tool_result_turn_carries_call_id() {
        let result = ToolResult::success("call_7", json!({"time": "2024-01-01 00:00:00"}));
        let turn = ConversationTurn::tool_result(&result);
        assert_eq!(turn.role, TurnRole::ToolResult);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_7"));
        assert!(turn.content.contains("2024-01-01"));
    }

    #[test]
    fn test_turn_serialization() {
        let turn = ConversationTurn::user("Hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
        assert!(!json.contains("toolCalls"));
    }
}
