//! Several tool servers behind one backend
//!
//! Each server's tool listing decides which tool names it answers. When two
//! servers list the same name the one configured first keeps it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::logging::{Logger, SharedLogger};
use crate::tools::ToolDescriptor;
use crate::{log_debug, log_warn};

use super::backend::{BackendError, BackendResult, ToolBackend};

/// Routes each call to the server that listed the tool
pub struct RoutedBackend {
    backends: Vec<(String, Arc<dyn ToolBackend>)>,
    /// Tool name to index into `backends`
    routes: HashMap<String, usize>,
    tools: Vec<ToolDescriptor>,
    logger: SharedLogger,
}

impl RoutedBackend {
    /// Ask every backend for its tools and build the routing table
    ///
    /// `backends` pairs a server label with its client.
    pub async fn build(backends: Vec<(String, Arc<dyn ToolBackend>)>, logger: SharedLogger) -> BackendResult<Self> {
        let mut routes: HashMap<String, usize> = HashMap::new();
        let mut tools = Vec::new();

        for (index, (label, backend)) in backends.iter().enumerate() {
            let listed = backend
                .list_tools()
                .await
                .map_err(|e| BackendError::Unavailable(format!("{}: {}", label, e)))?;
            log_debug!(logger, "Tool server {} lists {} tools", label, listed.len());

            for descriptor in listed {
                if let Some(&owner) = routes.get(&descriptor.name) {
                    log_warn!(
                        logger,
                        "Tool {} from {} is shadowed by {}",
                        descriptor.name,
                        label,
                        backends[owner].0
                    );
                    continue;
                }
                routes.insert(descriptor.name.clone(), index);
                tools.push(descriptor);
            }
        }

        Ok(Self {
            backends,
            routes,
            tools,
            logger,
        })
    }

    /// Label of the server that answers `tool`
    pub fn server_for(&self, tool: &str) -> Option<&str> {
        self.routes.get(tool).map(|&i| self.backends[i].0.as_str())
    }
}

#[async_trait]
impl ToolBackend for RoutedBackend {
    fn name(&self) -> &str {
        "routed"
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value> {
        let Some(&index) = self.routes.get(name) else {
            return Err(BackendError::Execution(format!("no tool server provides {}", name)));
        };
        let (label, backend) = &self.backends[index];
        log_debug!(self.logger, "Routing {} to {}", name, label);
        backend.call_tool(name, arguments).await
    }

    async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
        Ok(self.tools.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;

    /// Backend answering a fixed set of tools with its own label
    struct NamedBackend {
        label: &'static str,
        tools: &'static [&'static str],
    }

    #[async_trait]
    impl ToolBackend for NamedBackend {
        fn name(&self) -> &str {
            self.label
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> BackendResult<Value> {
            Ok(json!({"server": self.label, "tool": name}))
        }

        async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
            Ok(self
                .tools
                .iter()
                .map(|t| ToolDescriptor::new(*t, "", Default::default()))
                .collect())
        }
    }

    /// Backend whose listing always fails
    struct DownBackend;

    #[async_trait]
    impl ToolBackend for DownBackend {
        fn name(&self) -> &str {
            "down"
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> BackendResult<Value> {
            Err(BackendError::Unavailable("down".into()))
        }

        async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    fn entry(label: &'static str, tools: &'static [&'static str]) -> (String, Arc<dyn ToolBackend>) {
        (label.to_string(), Arc::new(NamedBackend { label, tools }))
    }

    #[tokio::test]
    async fn test_calls_go_to_the_listing_server() {
        let routed = RoutedBackend::build(
            vec![
                entry("builtin", &["get_weather", "now_time"]),
                entry("files", &["read_file", "now_time"]),
            ],
            Arc::new(NoOpLogger),
        )
        .await
        .unwrap();

        let result = routed.call_tool("read_file", json!({})).await.unwrap();
        assert_eq!(result, json!({"server": "files", "tool": "read_file"}));
        let result = routed.call_tool("get_weather", json!({})).await.unwrap();
        assert_eq!(result["server"], "builtin");

        // First server keeps a shared name
        assert_eq!(routed.server_for("now_time"), Some("builtin"));

        let names: Vec<String> = routed.list_tools().await.unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["get_weather", "now_time", "read_file"]);

        assert!(matches!(
            routed.call_tool("launch", json!({})).await,
            Err(BackendError::Execution(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_build() {
        let down: Arc<dyn ToolBackend> = Arc::new(DownBackend);
        let result = RoutedBackend::build(
            vec![entry("builtin", &["now_time"]), ("files".to_string(), down)],
            Arc::new(NoOpLogger),
        )
        .await;
        assert!(matches!(result, Err(BackendError::Unavailable(message)) if message.starts_with("files")));
    }
}
