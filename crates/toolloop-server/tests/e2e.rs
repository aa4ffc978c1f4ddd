//! End-to-end: agent loop + JSON-RPC client against a live tool server

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use toolloop_core::config::SessionSettings;
use toolloop_core::logging::NoOpLogger;
use toolloop_core::providers::{MockProvider, MockRound, ProviderModelConfig};
use toolloop_core::rpc::{ReconnectPolicy, RpcClient};
use toolloop_core::tools::{ToolDescriptor, ToolFilter, ToolRegistry};
use toolloop_core::transport::{BackendError, ToolBackend, ToolTransport};
use toolloop_core::{Agent, CancellationToken, SharedLogger, TurnRole};
use toolloop_server::{BuiltinHandler, HandlerResult, ToolHandler, ToolServer, WeatherSettings};

struct Running {
    endpoint: String,
    shutdown: CancellationToken,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_server(handler: Arc<dyn ToolHandler>) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();

    let server = Arc::new(ToolServer::new(handler, Arc::new(NoOpLogger)));
    tokio::spawn(server.serve_tcp(listener, shutdown.clone()));

    Running { endpoint, shutdown }
}

async fn start_builtin_server() -> Running {
    start_server(Arc::new(BuiltinHandler::new(
        WeatherSettings::default(),
        Arc::new(NoOpLogger),
    )))
    .await
}

fn agent_for(endpoint: &str, rounds: Vec<MockRound>) -> (Agent, Arc<MockProvider>) {
    let logger: SharedLogger = Arc::new(NoOpLogger);
    let client = RpcClient::from_endpoint(endpoint, logger.clone()).unwrap();
    let transport = Arc::new(ToolTransport::new(
        Arc::new(ToolRegistry::builtin()),
        Arc::new(client),
        logger.clone(),
    ));
    let provider = Arc::new(MockProvider::rounds(rounds, logger.clone()));
    let agent = Agent::new(provider.clone(), transport, ProviderModelConfig::new("mock"), logger);
    (agent, provider)
}

#[tokio::test]
async fn test_agent_runs_tools_on_live_server() {
    let server = start_builtin_server().await;
    let (agent, provider) = agent_for(
        &server.endpoint,
        vec![
            MockRound::new()
                .text("Checking. ")
                .tool_call("call_time", "now_time", json!({}))
                .tool_call_fragments("call_echo", 1, "run_shell", &["{\"command\": ", "\"echo hello\"}"]),
            MockRound::new().text("Done."),
        ],
    );

    let outcome = agent.run("What time is it?", CancellationToken::new(), None).await;
    assert_eq!(outcome.answer(), Some("Done."));

    let results: Vec<_> = outcome
        .history()
        .iter()
        .filter(|t| t.role == TurnRole::ToolResult)
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_call_id.as_deref(), Some("call_time"));
    assert!(results[0].content.contains("\"time\""));
    assert_eq!(results[1].tool_call_id.as_deref(), Some("call_echo"));

    #[cfg(unix)]
    {
        let shell: Value = serde_json::from_str(&results[1].content).unwrap();
        assert_eq!(shell["stdout"], "hello\n");
        assert_eq!(shell["returncode"], 0);
    }

    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_tool_failure_is_fed_back_to_model() {
    let server = start_builtin_server().await;
    let (agent, provider) = agent_for(
        &server.endpoint,
        vec![
            MockRound::new().tool_call("call_1", "get_weather", json!({"city": "110000"})),
            MockRound::new().text("The weather service is unavailable."),
        ],
    );

    let outcome = agent.run("Weather in Beijing?", CancellationToken::new(), None).await;
    assert!(outcome.is_done());

    // No API key on the test server
    let prompts = provider.prompts();
    let fed_back = prompts[1].last().unwrap();
    assert_eq!(fed_back.role, TurnRole::ToolResult);
    assert!(fed_back.content.starts_with("Error [tool_execution_error]"));
    assert!(fed_back.content.contains("API key"));
}

#[tokio::test]
async fn test_discovered_registry() {
    let server = start_builtin_server().await;
    let client = RpcClient::from_endpoint(&server.endpoint, Arc::new(NoOpLogger)).unwrap();

    let descriptors = client.list_tools().await.unwrap();
    let filter = ToolFilter::new().with_exclude(["run_shell".to_string()]);
    let registry = ToolRegistry::from_descriptors(descriptors, &filter);

    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["get_weather", "now_time"]);
    assert!(registry.validate("get_weather", &json!({})).is_err());
    assert!(registry.validate("now_time", &json!({})).is_ok());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_unavailable() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("tcp://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = RpcClient::from_endpoint(&endpoint, Arc::new(NoOpLogger))
        .unwrap()
        .with_policy(ReconnectPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(10),
            ..Default::default()
        });

    let result = client.call_tool("now_time", json!({})).await;
    assert!(matches!(result, Err(BackendError::Unavailable(_))));
}

/// Handler that answers `wait` after a delay and everything else at once
struct DelayHandler;

#[async_trait]
impl ToolHandler for DelayHandler {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call(&self, name: &str, arguments: Value) -> HandlerResult<Value> {
        if name == "wait" {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(json!({ "tool": name, "arguments": arguments }))
    }
}

#[tokio::test]
async fn test_concurrent_calls_share_one_connection() {
    let server = start_server(Arc::new(DelayHandler)).await;
    let client = Arc::new(RpcClient::from_endpoint(&server.endpoint, Arc::new(NoOpLogger)).unwrap());

    let slow = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_tool("wait", json!({"n": 1})).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The quick call completes while the slow one is still outstanding
    let quick = client.call_tool("now", json!({"n": 2})).await.unwrap();
    assert_eq!(quick["tool"], "now");
    assert!(!slow.is_finished());

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow["arguments"]["n"], 1);
    assert_eq!(client.outstanding().await, 0);
}
