//! Framed JSON-RPC server
//!
//! Each connection has one reader loop and one writer task. Every request
//! runs on its own task, so a slow tool never holds up the responses to
//! requests that arrived after it.
//!
//! Tool calls that name a client session are recorded in a bounded ledger.
//! A client that reconnects and re-sends the same request id joins the
//! execution still running or gets the stored response back, so the tool
//! runs once per session and request id.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use toolloop_core::logging::{Logger, SharedLogger};
use toolloop_core::rpc::protocol::{error_codes, methods, PingResult};
use toolloop_core::rpc::{read_frame, write_frame, RpcError, RpcRequest, RpcResponse, ToolCallParams, ToolListResult, ToolListing};
use toolloop_core::CancellationToken;
use toolloop_core::{log_debug, log_info, log_warn};

use crate::handler::{HandlerError, ToolHandler};

/// Number of session calls remembered for re-sends
const CALL_LEDGER_CAPACITY: usize = 1024;

type CallKey = (String, u64);
type SharedCall = Shared<BoxFuture<'static, RpcResponse>>;

/// Recent session tool calls, running or finished, oldest evicted first
struct CallLedger {
    calls: HashMap<CallKey, SharedCall>,
    order: VecDeque<CallKey>,
    capacity: usize,
}

impl CallLedger {
    fn new(capacity: usize) -> Self {
        Self {
            calls: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns the recorded call for `key`, or records the one `start` makes.
    /// The flag is true when an earlier call was joined.
    fn join_or_start(&mut self, key: CallKey, start: impl FnOnce() -> SharedCall) -> (SharedCall, bool) {
        if let Some(call) = self.calls.get(&key) {
            return (call.clone(), true);
        }

        let call = start();
        self.calls.insert(key.clone(), call.clone());
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.calls.remove(&oldest);
            }
        }
        (call, false)
    }
}

/// Serves a tool handler to any number of clients
pub struct ToolServer {
    handler: Arc<dyn ToolHandler>,
    calls: Mutex<CallLedger>,
    logger: SharedLogger,
}

impl ToolServer {
    pub fn new(handler: Arc<dyn ToolHandler>, logger: SharedLogger) -> Self {
        Self::with_ledger_capacity(handler, CALL_LEDGER_CAPACITY, logger)
    }

    pub fn with_ledger_capacity(handler: Arc<dyn ToolHandler>, capacity: usize, logger: SharedLogger) -> Self {
        Self {
            handler,
            calls: Mutex::new(CallLedger::new(capacity)),
            logger,
        }
    }

    /// Accept TCP connections until `shutdown` is cancelled
    pub async fn serve_tcp(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
        log_info!(self.logger, "Tool server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log_debug!(self.logger, "Client connected: {}", peer);
                        let _ = stream.set_nodelay(true);
                        let server = Arc::clone(&self);
                        tokio::spawn(async move { server.serve_connection(stream).await });
                    }
                    Err(e) => log_warn!(self.logger, "Accept failed: {}", e),
                },
            }
        }

        log_info!(self.logger, "Tool server stopped");
        Ok(())
    }

    /// Accept Unix socket connections until `shutdown` is cancelled
    #[cfg(unix)]
    pub async fn serve_unix(
        self: Arc<Self>,
        listener: tokio::net::UnixListener,
        shutdown: CancellationToken,
    ) -> io::Result<()> {
        log_info!(self.logger, "Tool server listening on {:?}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move { server.serve_connection(stream).await });
                    }
                    Err(e) => log_warn!(self.logger, "Accept failed: {}", e),
                },
            }
        }

        Ok(())
    }

    /// Serve one client until it disconnects
    pub async fn serve_connection<S>(self: Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let (tx, mut rx) = mpsc::unbounded_channel::<RpcResponse>();

        let logger = Arc::clone(&self.logger);
        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &response).await {
                    log_warn!(logger, "Failed to write response: {}", e);
                    break;
                }
            }
        });

        loop {
            let message = match read_frame(&mut reader).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(RpcError::Json(e)) => {
                    // The frame was consumed; the stream is still in sync
                    let _ = tx.send(RpcResponse::error(None, error_codes::PARSE_ERROR, e.to_string()));
                    continue;
                }
                Err(e) => {
                    log_warn!(self.logger, "Dropping connection: {}", e);
                    break;
                }
            };

            let request: RpcRequest = match serde_json::from_value(message.clone()) {
                Ok(request) => request,
                Err(e) => {
                    let id = message.get("id").and_then(Value::as_u64);
                    let _ = tx.send(RpcResponse::error(id, error_codes::INVALID_REQUEST, e.to_string()));
                    continue;
                }
            };

            let server = Arc::clone(&self);
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = server.handle_request(request).await;
                let _ = tx.send(response);
            });
        }

        // The writer finishes once in-flight requests have replied
        drop(tx);
        let _ = writer_task.await;
        log_debug!(self.logger, "Client disconnected");
    }

    /// Produce the response to one request
    pub async fn handle_request(self: Arc<Self>, request: RpcRequest) -> RpcResponse {
        let id = request.id;
        match request.method.as_str() {
            methods::TOOLS_LIST => {
                let tools = self
                    .handler
                    .descriptors()
                    .into_iter()
                    .map(|d| ToolListing {
                        input_schema: d.params.to_json_schema(),
                        name: d.name,
                        description: d.description,
                    })
                    .collect();
                respond(id, &ToolListResult { tools })
            }
            methods::TOOLS_CALL => {
                let params: ToolCallParams = match serde_json::from_value(request.params) {
                    Ok(params) => params,
                    Err(e) => return RpcResponse::error(Some(id), error_codes::INVALID_PARAMS, e.to_string()),
                };

                let Some(session) = params.session.clone() else {
                    return self.run_tool(id, params).await;
                };

                let server = Arc::clone(&self);
                let (call, joined) = self.calls.lock().join_or_start((session, id), move || {
                    async move { server.run_tool(id, params).await }.boxed().shared()
                });
                if joined {
                    log_debug!(self.logger, "Re-sent tools/call (id {}) joins the earlier execution", id);
                }
                call.await
            }
            methods::PING => respond(id, &PingResult { ok: true }),
            other => RpcResponse::error(
                Some(id),
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            ),
        }
    }
}

impl ToolServer {
    async fn run_tool(&self, id: u64, params: ToolCallParams) -> RpcResponse {
        log_debug!(self.logger, "tools/call {} (id {})", params.name, id);
        match self.handler.call(&params.name, params.arguments).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(e @ (HandlerError::UnknownTool(_) | HandlerError::InvalidParams { .. })) => {
                RpcResponse::error(Some(id), error_codes::INVALID_PARAMS, e.to_string())
            }
            Err(e @ HandlerError::Execution(_)) => {
                RpcResponse::error(Some(id), error_codes::TOOL_EXECUTION_ERROR, e.to_string())
            }
        }
    }
}

fn respond<T: serde::Serialize>(id: u64, result: &T) -> RpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => RpcResponse::success(id, value),
        Err(e) => RpcResponse::error(Some(id), error_codes::INTERNAL_ERROR, e.to_string()),
    }
}
