//! JSON-RPC 2.0 messages spoken with the tool server

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{RpcError, RpcResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Method names
pub mod methods {
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PING: &str = "lifecycle/ping";
}

/// Error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The tool ran and reported a failure
    pub const TOOL_EXECUTION_ERROR: i64 = -32000;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// `None` only for errors on requests whose id could not be read
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    /// The result value, or the remote error
    pub fn into_result(self) -> RpcResult<Value> {
        match self.error {
            Some(error) => Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Params of `tools/call`
///
/// `session` identifies the client across reconnects. A server that sees the
/// same session and request id again answers from the first execution
/// instead of running the tool twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// One entry of a `tools/list` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolListing {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Result of `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<ToolListing>,
}

/// Result of `lifecycle/ping`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = RpcRequest::new(7, methods::TOOLS_CALL, json!({"name": "now_time", "arguments": {}}));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "tools/call");
    }

    #[test]
    fn test_request_without_params() {
        let request: RpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "lifecycle/ping"})).unwrap();
        assert_eq!(request.params, Value::Null);
    }

    #[test]
    fn test_call_params_session_is_optional() {
        let params: ToolCallParams =
            serde_json::from_value(json!({"name": "now_time", "arguments": {}})).unwrap();
        assert_eq!(params.session, None);

        let params = ToolCallParams {
            session: Some("s-1".into()),
            ..params
        };
        assert_eq!(serde_json::to_value(&params).unwrap()["session"], "s-1");
    }

    #[test]
    fn test_response_into_result() {
        let ok = RpcResponse::success(1, json!({"time": "2024-01-01 00:00:00"}));
        assert_eq!(ok.into_result().unwrap()["time"], "2024-01-01 00:00:00");

        let err = RpcResponse::error(Some(2), error_codes::TOOL_EXECUTION_ERROR, "boom");
        assert!(matches!(
            err.into_result(),
            Err(RpcError::Remote { code: -32000, ref message }) if message == "boom"
        ));
    }

    #[test]
    fn test_error_response_omits_result() {
        let json = serde_json::to_value(RpcResponse::error(None, error_codes::PARSE_ERROR, "bad json")).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["code"], -32700);
    }

    #[test]
    fn test_null_result_is_success() {
        let response: RpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "result": null})).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }
}
