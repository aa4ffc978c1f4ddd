//! JSON-RPC transport to the tool server
//!
//! The protocol uses:
//! - TCP or Unix sockets
//! - JSON-RPC 2.0 with Content-Length headers (LSP-style)
//! - One persistent connection multiplexing any number of requests
//!
//! ```rust,ignore
//! let client = RpcClient::from_endpoint("tcp://127.0.0.1:8080", logger)?;
//!
//! // List tools
//! let tools = client.list_tools().await?;
//!
//! // Call a tool
//! let result = client.call_tool("get_weather", json!({ "city": "Paris" })).await?;
//! ```
//!
//! The server side of the protocol reuses `codec` and `protocol`.

mod client;
pub mod codec;
mod connector;
mod error;
pub mod protocol;

pub use client::{ReconnectPolicy, RpcClient};
pub use codec::{encode_frame, read_frame, write_frame};
pub use connector::{BoxedStream, Connector, Endpoint, RpcStream};
pub use error::{RpcError, RpcResult};
pub use protocol::{RpcErrorObject, RpcRequest, RpcResponse, ToolCallParams, ToolListResult, ToolListing};
