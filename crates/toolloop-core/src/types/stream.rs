//! Streaming response types

use serde::{Deserialize, Serialize};
use super::tool::{FailureKind, ToolCall};

/// Raw fragment of a streamed model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text content chunk
    Text {
        text: String,
    },
    /// Complete tool call (providers that only report calls at end of response)
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    /// Partial tool call (for streaming tool arguments)
    ToolCallDelta {
        /// Correlation id; may be empty on continuation fragments
        id: String,
        /// Ordinal position of the call within the response
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "inputDelta", skip_serializing_if = "Option::is_none")]
        input_delta: Option<String>,
    },
}

impl StreamChunk {
    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        StreamChunk::Text { text: text.into() }
    }

    /// Create a tool call chunk
    pub fn tool_call(tool_call: ToolCall) -> Self {
        StreamChunk::ToolCall { tool_call }
    }

    /// Create the first fragment of a tool call, carrying its name
    pub fn tool_call_start(id: impl Into<String>, index: u32, name: impl Into<String>) -> Self {
        StreamChunk::ToolCallDelta {
            id: id.into(),
            index,
            name: Some(name.into()),
            input_delta: None,
        }
    }

    /// Create an argument fragment of a tool call
    pub fn tool_call_args(id: impl Into<String>, index: u32, input_delta: impl Into<String>) -> Self {
        StreamChunk::ToolCallDelta {
            id: id.into(),
            index,
            name: None,
            input_delta: Some(input_delta.into()),
        }
    }

    /// Get the text content if this is a text chunk
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamChunk::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Completed event produced by reassembling a chunk stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text in source order
    Text(String),
    /// A tool call whose arguments parsed as a complete object
    ///
    /// `seq` is the position at which the call's id was first seen in the
    /// response, which may differ from the order calls complete in.
    ToolCallCompleted { seq: usize, call: ToolCall },
    /// A tool call that can never be dispatched
    ToolCallFailed {
        seq: usize,
        id: String,
        name: Option<String>,
        kind: FailureKind,
        message: String,
    },
}
