//! Core types for agent interactions
//!
//! This module contains the shared types used across the registry, the
//! reassembler, the transport and the agent loop.

mod message;
mod tool;
mod stream;
mod cancellation;

pub use message::{ConversationHistory, ConversationTurn, TurnRole};
pub use tool::{FailureKind, ToolCall, ToolChoice, ToolFailure, ToolOutcome, ToolResult, ToolSchema};
pub use stream::{StreamChunk, StreamEvent};
pub use cancellation::CancellationToken;
