//! toolloop tool server
//!
//! Hosts the built-in tools behind the framed JSON-RPC protocol spoken by
//! `toolloop_core::rpc::RpcClient`.

pub mod handler;
pub mod server;

pub use handler::{BuiltinHandler, HandlerError, HandlerResult, ToolHandler, WeatherSettings, DEFAULT_WEATHER_URL};
pub use server::ToolServer;
