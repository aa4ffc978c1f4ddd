//! Persistent, multiplexed JSON-RPC client for the tool server
//!
//! One connection carries any number of outstanding requests:
//! - a writer task owns the write half and sends frames in submission order
//! - a reader task owns the read half and routes each response to its
//!   caller through the correlation table (`id → oneshot`)
//!
//! When the connection drops, every outstanding caller is woken, reconnects
//! (bounded attempts with exponential backoff) and re-sends its request with
//! the same id once. Tool calls carry the client's session id so the server
//! can recognise the re-send and not run the tool a second time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

use crate::logging::{Logger, SharedLogger};
use crate::tools::ToolDescriptor;
use crate::transport::{BackendError, BackendResult, ToolBackend};
use crate::{log_debug, log_info, log_warn};
use super::codec::{encode_frame, read_frame};
use super::connector::{BoxedStream, Connector, Endpoint};
use super::error::{RpcError, RpcResult};
use super::protocol::{error_codes, methods, PingResult, RpcRequest, RpcResponse, ToolCallParams, ToolListResult};

type PendingTable = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// Reconnection behaviour
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Connection attempts per (re)connect, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Limit for a single connection attempt
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay after the given failed attempt (0-based)
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_backoff)
    }
}

/// One live connection and its correlation table
#[derive(Clone)]
struct Connection {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingTable,
    alive: Arc<AtomicBool>,
}

impl Connection {
    fn open(stream: BoxedStream, logger: SharedLogger) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, rx) = mpsc::unbounded_channel();
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_loop(write_half, rx, pending.clone(), alive.clone(), logger.clone()));
        tokio::spawn(read_loop(read_half, pending.clone(), alive.clone(), logger));

        Self {
            outbound,
            pending,
            alive,
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Add a correlation entry; `None` if the connection already died
    fn register(&self, id: u64) -> Option<oneshot::Receiver<RpcResponse>> {
        let mut table = self.pending.lock();
        if !self.is_alive() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        table.insert(id, tx);
        Some(rx)
    }

    fn shutdown(&self) {
        close(&self.pending, &self.alive);
    }
}

/// Mark a connection dead and fail every outstanding entry
fn close(pending: &PendingTable, alive: &AtomicBool) {
    let mut table = pending.lock();
    alive.store(false, Ordering::SeqCst);
    table.clear();
}

/// Removes a correlation entry when the caller stops waiting
struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.lock().remove(&self.id);
    }
}

async fn write_loop(
    mut writer: WriteHalf<BoxedStream>,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: PendingTable,
    alive: Arc<AtomicBool>,
    logger: SharedLogger,
) {
    while let Some(frame) = rx.recv().await {
        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            log_warn!(logger, "RPC write failed: {}", e);
            break;
        }
    }
    close(&pending, &alive);
}

async fn read_loop(
    reader: ReadHalf<BoxedStream>,
    pending: PendingTable,
    alive: Arc<AtomicBool>,
    logger: SharedLogger,
) {
    let mut reader = BufReader::new(reader);
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(value)) => {
                let response: RpcResponse = match serde_json::from_value(value) {
                    Ok(response) => response,
                    Err(e) => {
                        log_warn!(logger, "Ignoring malformed response: {}", e);
                        continue;
                    }
                };
                let Some(id) = response.id else {
                    log_warn!(logger, "Ignoring response without id: {:?}", response.error);
                    continue;
                };
                let waiter = pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => log_debug!(logger, "Dropping response for abandoned request {}", id),
                }
            }
            Ok(None) => {
                log_info!(logger, "Tool server closed the connection");
                break;
            }
            Err(e) => {
                log_warn!(logger, "RPC read failed: {}", e);
                break;
            }
        }
    }
    close(&pending, &alive);
}

/// JSON-RPC client
pub struct RpcClient {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    request_id: AtomicU64,
    /// Identifies this client to the server across reconnects
    session: String,
    /// Current connection; the async lock makes concurrent waiters share one reconnect
    connection: tokio::sync::Mutex<Option<Connection>>,
    logger: SharedLogger,
}

impl RpcClient {
    /// Create a client; no connection is made until the first request
    pub fn new(connector: Arc<dyn Connector>, logger: SharedLogger) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::default(),
            request_id: AtomicU64::new(0),
            session: uuid::Uuid::new_v4().to_string(),
            connection: tokio::sync::Mutex::new(None),
            logger,
        }
    }

    /// Create a client for an endpoint string (`tcp://host:port`, `unix:/path`)
    pub fn from_endpoint(endpoint: &str, logger: SharedLogger) -> RpcResult<Self> {
        Ok(Self::new(Arc::new(Endpoint::parse(endpoint)?), logger))
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Establish the connection eagerly
    pub async fn connect(&self) -> RpcResult<()> {
        self.connection().await.map(|_| ())
    }

    /// Number of requests currently awaiting a response
    pub async fn outstanding(&self) -> usize {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.pending.lock().len())
            .unwrap_or(0)
    }

    /// Current live connection, reconnecting if needed
    async fn connection(&self) -> RpcResult<Connection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref().filter(|c| c.is_alive()) {
            return Ok(conn.clone());
        }
        *slot = None;

        let target = self.connector.describe();
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
            }

            match tokio::time::timeout(self.policy.connect_timeout, self.connector.connect()).await {
                Ok(Ok(stream)) => {
                    log_info!(self.logger, "Connected to tool server at {}", target);
                    let conn = Connection::open(stream, self.logger.clone());
                    *slot = Some(conn.clone());
                    return Ok(conn);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {:?}", self.policy.connect_timeout),
            }

            log_warn!(
                self.logger,
                "Connecting to {} failed (attempt {}/{}): {}",
                target,
                attempt + 1,
                attempts,
                last_error
            );
        }

        Err(RpcError::Unavailable(format!("{}: {}", target, last_error)))
    }

    /// Make a JSON-RPC request
    pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> RpcResult<R> {
        let result = self.request(method, serde_json::to_value(params)?).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn request(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = encode_frame(&RpcRequest::new(id, method, params))?;
        let mut resent = false;

        loop {
            let conn = self.connection().await?;

            if let Some(rx) = conn.register(id) {
                let _guard = PendingGuard {
                    table: &conn.pending,
                    id,
                };
                log_debug!(self.logger, "Sending request: method={}, id={}", method, id);

                if conn.outbound.send(frame.clone()).is_ok() {
                    if let Ok(response) = rx.await {
                        return response.into_result();
                    }
                } else {
                    conn.shutdown();
                }
            }

            if resent {
                log_warn!(self.logger, "Connection lost again during {} (id {})", method, id);
                return Err(RpcError::ConnectionLost);
            }
            log_warn!(self.logger, "Connection lost during {} (id {}), reconnecting", method, id);
            resent = true;
        }
    }

    /// Check if the server is responsive
    pub async fn ping(&self) -> RpcResult<bool> {
        let result: PingResult = self.call(methods::PING, json!({})).await?;
        Ok(result.ok)
    }
}

fn into_backend_error(error: RpcError) -> BackendError {
    match error {
        RpcError::Remote {
            code: error_codes::TOOL_EXECUTION_ERROR,
            message,
        } => BackendError::Execution(message),
        RpcError::Remote { code, message } => BackendError::Execution(format!("remote error {}: {}", code, message)),
        other => BackendError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ToolBackend for RpcClient {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
            session: Some(self.session.clone()),
        };
        self.call(methods::TOOLS_CALL, params).await.map_err(into_backend_error)
    }

    async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
        let result: ToolListResult = self
            .call(methods::TOOLS_LIST, json!({}))
            .await
            .map_err(into_backend_error)?;

        Ok(result
            .tools
            .into_iter()
            .map(|t| ToolDescriptor::from_listing(t.name, t.description, &t.input_schema))
            .collect())
    }
}
