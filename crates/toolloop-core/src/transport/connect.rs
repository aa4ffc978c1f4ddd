//! Backend selection from configuration

use std::sync::Arc;

use crate::config::{ToolServerKind, ToolServerSettings};
use crate::logging::{Logger, SharedLogger};
use crate::mcp::McpClient;
use crate::rpc::RpcClient;
use crate::log_info;

use super::backend::{BackendError, BackendResult, ToolBackend};
use super::router::RoutedBackend;

/// Open every configured tool server
///
/// A single server is used directly. Several servers are combined into a
/// [`RoutedBackend`] built from their tool listings.
pub async fn connect_backends(servers: &[ToolServerSettings], logger: SharedLogger) -> BackendResult<Arc<dyn ToolBackend>> {
    match servers {
        [] => Err(BackendError::Unavailable("no tool server configured".to_string())),
        [single] => connect_backend(single, logger).await,
        _ => {
            let mut backends = Vec::with_capacity(servers.len());
            for settings in servers {
                let backend = connect_backend(settings, logger.clone())
                    .await
                    .map_err(|e| BackendError::Unavailable(format!("{}: {}", settings.label(), e)))?;
                backends.push((settings.label().to_string(), backend));
            }
            Ok(Arc::new(RoutedBackend::build(backends, logger).await?))
        }
    }
}

/// Open the tool server named by `settings`
///
/// The JSON-RPC client connects eagerly so a wrong endpoint is reported at
/// startup; it still reconnects on its own later.
pub async fn connect_backend(settings: &ToolServerSettings, logger: SharedLogger) -> BackendResult<Arc<dyn ToolBackend>> {
    match settings.kind {
        ToolServerKind::Rpc => {
            let client = RpcClient::from_endpoint(&settings.endpoint, logger.clone())
                .map_err(|e| BackendError::Unavailable(e.to_string()))?
                .with_policy(settings.reconnect_policy());
            client
                .connect()
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            log_info!(logger, "Connected to JSON-RPC tool server at {}", settings.endpoint);
            Ok(Arc::new(client))
        }
        ToolServerKind::Mcp => {
            let client = McpClient::connect(&settings.endpoint, logger.clone())
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            log_info!(logger, "Connected to MCP tool server at {}", settings.endpoint);
            Ok(Arc::new(client))
        }
        ToolServerKind::Stdio => {
            let command = settings
                .command
                .as_deref()
                .ok_or_else(|| BackendError::Unavailable("stdio server has no command".to_string()))?;
            let client = McpClient::spawn_stdio(command, &settings.args, &settings.env, logger.clone())
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?;
            log_info!(logger, "Started MCP tool server {}", settings.label());
            Ok(Arc::new(client))
        }
    }
}
