//! MCP (Model Context Protocol) tool backend
//!
//! Uses the official rmcp SDK to connect to MCP servers.
//! Supports Unix socket, HTTP and child-process stdio transports.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolloop_core::mcp::McpClient;
//! use std::sync::Arc;
//!
//! let client = McpClient::connect("http://127.0.0.1:8000/mcp", logger).await?;
//!
//! // Discover tools and build a registry from them
//! let registry = ToolRegistry::from_descriptors(client.list_tools().await?, &ToolFilter::new());
//! ```

mod client;

pub use client::{McpClient, McpError, McpResult};
