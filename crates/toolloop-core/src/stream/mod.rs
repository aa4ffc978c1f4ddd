//! Streamed response reassembly
//!
//! Model responses arrive as interleaved fragments: text deltas and partial
//! tool calls keyed by correlation id. The reassembler turns them into text
//! events and tool calls whose arguments parse as complete JSON objects.

mod reassembler;

pub use reassembler::{reassemble, EventStream, StreamReassembler};
