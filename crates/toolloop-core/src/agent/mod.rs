//! Orchestration loop
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!     AwaitingModel ──► Streaming ──► Dispatching ──────────┘
//!            │              │              │
//!            │              └── no calls ──┴──► Done
//!            └──── model error / deadline / cancel / max_turns ──► Aborted
//! ```
//!
//! Completed tool calls are dispatched while the model is still streaming.
//! Results are appended in the order the calls appeared in the assistant
//! turn, after every call of the round has resolved.

mod session;

pub use session::{AbortReason, Phase, SessionEvent, SessionOutcome};

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{AgentConfig, SessionSettings};
use crate::logging::{Logger, SharedLogger};
use crate::providers::{Provider, ProviderError, ProviderModelConfig, StreamChatOptions};
use crate::stream::reassemble;
use crate::tools::ToolRegistry;
use crate::transport::ToolTransport;
use crate::types::{
    CancellationToken, ConversationHistory, ConversationTurn, FailureKind, StreamEvent, ToolCall, ToolResult,
};
use crate::{log_debug, log_info, log_warn};
use session::Observer;

/// Name recorded for a failed call whose name never arrived
const UNKNOWN_TOOL_NAME: &str = "unknown";

/// A tool call of the current round, running or already resolved
enum Slot {
    Running { call_id: String, handle: JoinHandle<ToolResult> },
    Resolved(ToolResult),
}

/// One call of the assistant turn with its first-seen position
struct RoundCall {
    seq: usize,
    call: ToolCall,
    slot: Slot,
}

/// Assistant turn being assembled from the model stream
#[derive(Default)]
struct PendingTurn {
    text: String,
    calls: Vec<RoundCall>,
}

impl PendingTurn {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.calls.is_empty()
    }

    fn push(&mut self, seq: usize, call: ToolCall, slot: Slot) {
        self.calls.push(RoundCall { seq, call, slot });
    }

    /// Put calls in the order their ids first appeared in the response
    fn order_calls(&mut self) {
        self.calls.sort_by_key(|c| c.seq);
    }

    fn to_turn(&self) -> ConversationTurn {
        if self.calls.is_empty() {
            ConversationTurn::assistant(self.text.clone())
        } else {
            let calls = self.calls.iter().map(|c| c.call.clone()).collect();
            ConversationTurn::assistant_with_calls(self.text.clone(), calls)
        }
    }

    fn into_slots(self) -> Vec<Slot> {
        self.calls.into_iter().map(|c| c.slot).collect()
    }

    /// Stop running invocations without waiting for them
    fn discard(self) {
        for slot in self.into_slots() {
            if let Slot::Running { handle, .. } = slot {
                handle.abort();
            }
        }
    }
}

/// Wait for every slot, in slot order
async fn resolve_all(slots: Vec<Slot>) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(slots.len());
    for slot in slots {
        let result = match slot {
            Slot::Resolved(result) => result,
            Slot::Running { call_id, handle } => handle.await.unwrap_or_else(|e| {
                ToolResult::failure(
                    call_id,
                    FailureKind::ToolExecutionError,
                    format!("invocation task failed: {}", e),
                )
            }),
        };
        results.push(result);
    }
    results
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Drives one conversation between a model and the tool server
pub struct Agent {
    provider: Arc<dyn Provider>,
    transport: Arc<ToolTransport>,
    model: ProviderModelConfig,
    options: StreamChatOptions,
    settings: SessionSettings,
    logger: SharedLogger,
}

impl Agent {
    /// Create an agent advertising every tool in the transport's registry
    pub fn new(
        provider: Arc<dyn Provider>,
        transport: Arc<ToolTransport>,
        model: ProviderModelConfig,
        logger: SharedLogger,
    ) -> Self {
        let options = StreamChatOptions::new().with_tools(transport.registry().schemas());
        Self {
            provider,
            transport,
            model,
            options,
            settings: SessionSettings::default(),
            logger,
        }
    }

    /// Create an agent from the model and session sections of a config file
    pub fn from_config(
        config: &AgentConfig,
        provider: Arc<dyn Provider>,
        transport: Arc<ToolTransport>,
        logger: SharedLogger,
    ) -> Self {
        let options = config.model.chat_options(transport.registry().schemas());
        Self {
            provider,
            transport,
            model: config.model.model_config(),
            options,
            settings: config.session.clone(),
            logger,
        }
    }

    /// Replace the request options; the advertised tools are kept
    pub fn with_options(mut self, options: StreamChatOptions) -> Self {
        let tools = std::mem::take(&mut self.options.tools);
        self.options = StreamChatOptions { tools, ..options };
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.transport.registry()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// History a new conversation starts from: the system prompt, if any
    pub fn initial_history(&self) -> ConversationHistory {
        if self.settings.instructions.trim().is_empty() {
            Vec::new()
        } else {
            vec![ConversationTurn::system(self.settings.instructions.clone())]
        }
    }

    /// Answer one user message in a fresh conversation
    pub async fn run(
        &self,
        user_message: impl Into<String>,
        cancel: CancellationToken,
        observer: Option<UnboundedSender<SessionEvent>>,
    ) -> SessionOutcome {
        let mut history = self.initial_history();
        history.push(ConversationTurn::user(user_message));
        self.run_with_history(history, cancel, observer).await
    }

    /// Continue a conversation whose last turn is awaiting a model reply
    pub async fn run_with_history(
        &self,
        mut history: ConversationHistory,
        cancel: CancellationToken,
        observer: Option<UnboundedSender<SessionEvent>>,
    ) -> SessionOutcome {
        let observer = Observer::new(observer);
        let deadline = self.settings.deadline().map(|limit| Instant::now() + limit);
        let mut round = 0usize;

        loop {
            if round >= self.settings.max_turns {
                let reason = AbortReason::MaxTurnsExceeded(self.settings.max_turns);
                return self.abort(reason, history, &observer);
            }
            round += 1;

            observer.emit(SessionEvent::PhaseChanged(Phase::AwaitingModel));
            log_debug!(self.logger, "Round {}: prompting model with {} turns", round, history.len());

            let round_cancel = cancel.child_token();
            let started = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AbortReason::Cancelled),
                _ = deadline_reached(deadline) => Err(AbortReason::DeadlineExceeded),
                result = self.provider.stream_chat(&history, &self.model, &self.options, round_cancel.clone()) => {
                    result.map_err(AbortReason::Model)
                }
            };
            let stream = match started {
                Ok(stream) => stream,
                Err(reason) => return self.abort(reason, history, &observer),
            };

            observer.emit(SessionEvent::PhaseChanged(Phase::Streaming));
            let mut events = reassemble(stream, Arc::clone(&self.logger));
            let mut pending = PendingTurn::default();

            let interrupted = loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Some(AbortReason::Cancelled),
                    _ = deadline_reached(deadline) => break Some(AbortReason::DeadlineExceeded),
                    next = events.next() => next,
                };

                match next {
                    None => break None,
                    Some(Ok(event)) => self.apply_event(event, &mut pending, &round_cancel, &observer),
                    Some(Err(ProviderError::Cancelled)) if cancel.is_cancelled() => {
                        break Some(AbortReason::Cancelled);
                    }
                    Some(Err(e)) => {
                        // The partial turn never reaches history, so neither may its results
                        log_warn!(self.logger, "Model stream failed mid-response: {}", e);
                        round_cancel.cancel();
                        pending.discard();
                        return self.abort(AbortReason::Model(e), history, &observer);
                    }
                }
            };
            drop(events);

            pending.order_calls();
            if let Some(reason) = interrupted {
                round_cancel.cancel();
                if !pending.is_empty() {
                    history.push(pending.to_turn());
                }
                let results = resolve_all(pending.into_slots()).await;
                history.extend(results.iter().map(ConversationTurn::tool_result));
                return self.abort(reason, history, &observer);
            }

            history.push(pending.to_turn());
            if pending.calls.is_empty() {
                log_info!(self.logger, "Session done after {} rounds", round);
                observer.emit(SessionEvent::PhaseChanged(Phase::Done));
                return SessionOutcome::Done {
                    answer: pending.text,
                    history,
                };
            }

            observer.emit(SessionEvent::PhaseChanged(Phase::Dispatching));
            log_debug!(self.logger, "Round {}: waiting for {} tool calls", round, pending.calls.len());

            let collect = resolve_all(pending.into_slots());
            tokio::pin!(collect);
            let (results, interrupted) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    round_cancel.cancel();
                    (collect.await, Some(AbortReason::Cancelled))
                }
                _ = deadline_reached(deadline) => {
                    round_cancel.cancel();
                    (collect.await, Some(AbortReason::DeadlineExceeded))
                }
                results = &mut collect => (results, None),
            };

            history.extend(results.iter().map(ConversationTurn::tool_result));
            if let Some(reason) = interrupted {
                return self.abort(reason, history, &observer);
            }
        }
    }

    fn apply_event(
        &self,
        event: StreamEvent,
        pending: &mut PendingTurn,
        round_cancel: &CancellationToken,
        observer: &Observer,
    ) {
        match event {
            StreamEvent::Text(text) => {
                observer.emit(SessionEvent::TextDelta(text.clone()));
                pending.text.push_str(&text);
            }
            StreamEvent::ToolCallCompleted { seq, call } => {
                observer.emit(SessionEvent::ToolCallStarted {
                    id: call.id.clone(),
                    name: call.name.clone(),
                });
                let handle = self.dispatch(call.clone(), round_cancel.clone(), observer.clone());
                let call_id = call.id.clone();
                pending.push(seq, call, Slot::Running { call_id, handle });
            }
            StreamEvent::ToolCallFailed {
                seq,
                id,
                name,
                kind,
                message,
            } => {
                let name = name.unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string());
                log_warn!(self.logger, "Tool call {} ({}) failed in stream: {}", id, name, message);
                let result = ToolResult::failure(&id, kind, message);
                observer.emit(SessionEvent::ToolCallFinished(result.clone()));
                let call = ToolCall::new(id, name, serde_json::Value::Object(Default::default()));
                pending.push(seq, call, Slot::Resolved(result));
            }
        }
    }

    fn dispatch(&self, call: ToolCall, cancel: CancellationToken, observer: Observer) -> JoinHandle<ToolResult> {
        let transport = Arc::clone(&self.transport);
        let timeout = self.settings.tool_timeout(&call.name);
        tokio::spawn(async move {
            let result = transport.invoke(&call, timeout, cancel).await;
            observer.emit(SessionEvent::ToolCallFinished(result.clone()));
            result
        })
    }

    fn abort(&self, reason: AbortReason, history: ConversationHistory, observer: &Observer) -> SessionOutcome {
        log_warn!(self.logger, "Session aborted: {}", reason);
        observer.emit(SessionEvent::PhaseChanged(Phase::Aborted));
        SessionOutcome::Aborted { reason, history }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::providers::{MockProvider, MockRound};
    use crate::tools::ToolDescriptor;
    use crate::transport::{BackendResult, ToolBackend};
    use crate::types::TurnRole;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Tool server stand-in: weather is sunny, shell commands never return
    #[derive(Default)]
    struct ScriptedBackend {
        invoked: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn invoked(&self) -> Vec<String> {
            self.invoked.lock().clone()
        }
    }

    #[async_trait]
    impl ToolBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> BackendResult<Value> {
            self.invoked.lock().push(name.to_string());
            match name {
                "get_weather" => Ok(json!({"city": arguments["city"], "weather": "sunny"})),
                "now_time" => Ok(json!({"time": "2024-05-01 12:00:00"})),
                _ => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(json!({"stdout": "", "stderr": "", "returncode": 0}))
                }
            }
        }

        async fn list_tools(&self) -> BackendResult<Vec<ToolDescriptor>> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        agent: Agent,
        provider: Arc<MockProvider>,
        backend: Arc<ScriptedBackend>,
    }

    fn harness(rounds: Vec<MockRound>, settings: SessionSettings) -> Harness {
        let logger: SharedLogger = Arc::new(NoOpLogger);
        let provider = Arc::new(MockProvider::rounds(rounds, logger.clone()));
        let backend = Arc::new(ScriptedBackend::default());
        let transport = Arc::new(ToolTransport::new(
            Arc::new(ToolRegistry::builtin()),
            backend.clone(),
            logger.clone(),
        ));
        let agent = Agent::new(provider.clone(), transport, ProviderModelConfig::new("mock-model"), logger)
            .with_settings(settings);
        Harness {
            agent,
            provider,
            backend,
        }
    }

    fn tool_turns(history: &[ConversationTurn]) -> Vec<&ConversationTurn> {
        history.iter().filter(|t| t.role == TurnRole::ToolResult).collect()
    }

    #[tokio::test]
    async fn test_weather_call_then_answer() {
        let h = harness(
            vec![
                MockRound::new().tool_call("call_1", "get_weather", json!({"city": "Paris"})),
                MockRound::new().text("It is ").text("sunny"),
            ],
            SessionSettings::default(),
        );

        let outcome = h.agent.run("Weather in Paris?", CancellationToken::new(), None).await;

        assert_eq!(outcome.answer(), Some("It is sunny"));
        let history = outcome.history();
        let roles: Vec<TurnRole> = history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                TurnRole::System,
                TurnRole::User,
                TurnRole::Assistant,
                TurnRole::ToolResult,
                TurnRole::Assistant
            ]
        );
        assert_eq!(history[2].tool_calls[0].id, "call_1");
        assert_eq!(history[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(history[3].content.contains("sunny"));

        // The second request carries the tool result
        let prompts = h.provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1].last().map(|t| t.role), Some(TurnRole::ToolResult));
        assert_eq!(h.backend.invoked(), vec!["get_weather"]);
    }

    #[tokio::test]
    async fn test_incomplete_arguments_are_reported_to_model() {
        let h = harness(
            vec![
                MockRound::new().tool_call_fragments("call_1", 0, "get_weather", &["{\"city\": \"Par"]),
                MockRound::new().text("Which city did you mean?"),
            ],
            SessionSettings::default(),
        );

        let outcome = h.agent.run("Weather?", CancellationToken::new(), None).await;

        assert_eq!(outcome.answer(), Some("Which city did you mean?"));
        let history = outcome.history();
        let assistant = &history[2];
        assert_eq!(assistant.tool_calls[0].name, "get_weather");
        assert_eq!(assistant.tool_calls[0].input, json!({}));

        let results = tool_turns(history);
        assert_eq!(results.len(), 1);
        assert!(results[0].content.starts_with("Error [incomplete_tool_call]"));
        assert!(h.backend.invoked().is_empty());
        assert_eq!(h.provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_orphan_fragment_recorded_as_unknown() {
        let h = harness(
            vec![
                MockRound::new().chunk(crate::types::StreamChunk::tool_call_args("call_9", 0, "{}")),
                MockRound::new().text("Sorry."),
            ],
            SessionSettings::default(),
        );

        let outcome = h.agent.run("Hi", CancellationToken::new(), None).await;

        assert!(outcome.is_done());
        let history = outcome.history();
        assert_eq!(history[2].tool_calls[0].name, UNKNOWN_TOOL_NAME);
        assert!(tool_turns(history)[0].content.starts_with("Error [orphan_fragment]"));
    }

    #[tokio::test]
    async fn test_turn_keeps_first_seen_order_of_interleaved_calls() {
        use crate::types::StreamChunk;

        // `b` completes before `a`, whose id appeared first
        let h = harness(
            vec![
                MockRound::new()
                    .chunk(StreamChunk::tool_call_start("a", 0, "get_weather"))
                    .chunk(StreamChunk::tool_call_start("b", 1, "now_time"))
                    .chunk(StreamChunk::tool_call_args("a", 0, "{\"city\""))
                    .chunk(StreamChunk::tool_call_args("b", 1, "{}"))
                    .chunk(StreamChunk::tool_call_args("a", 0, ": \"Oslo\"}")),
                MockRound::new().text("Sunny at noon."),
            ],
            SessionSettings::default(),
        );

        let outcome = h.agent.run("Weather and time?", CancellationToken::new(), None).await;
        assert_eq!(outcome.answer(), Some("Sunny at noon."));

        let history = outcome.history();
        let call_ids: Vec<&str> = history[2].tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(call_ids, vec!["a", "b"]);

        let result_ids: Vec<Option<&str>> = tool_turns(history)
            .iter()
            .map(|t| t.tool_call_id.as_deref())
            .collect();
        assert_eq!(result_ids, vec![Some("a"), Some("b")]);
        assert!(tool_turns(history)[0].content.contains("Oslo"));

        let mut invoked = h.backend.invoked();
        invoked.sort();
        assert_eq!(invoked, vec!["get_weather", "now_time"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_and_success_in_same_round() {
        let settings = SessionSettings {
            tool_timeouts_ms: HashMap::from([("run_shell".to_string(), 100)]),
            ..Default::default()
        };
        let h = harness(
            vec![
                MockRound::new()
                    .tool_call("slow", "run_shell", json!({"command": "sleep 100"}))
                    .tool_call("fast", "get_weather", json!({"city": "Oslo"})),
                MockRound::new().text("Shell timed out, Oslo is sunny."),
            ],
            settings,
        );

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = h.agent.run("Do both", CancellationToken::new(), Some(tx)).await;
        assert!(outcome.is_done());

        // First-seen order, not completion order
        let results = tool_turns(outcome.history());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("slow"));
        assert!(results[0].content.starts_with("Error [timeout]"));
        assert_eq!(results[1].tool_call_id.as_deref(), Some("fast"));
        assert!(results[1].content.contains("sunny"));

        // The fast call finished while the slow one was still outstanding
        let mut finished = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::ToolCallFinished(result) = event {
                finished.push(result.call_id);
            }
        }
        assert_eq!(finished, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_model_failure_mid_stream() {
        let h = harness(
            vec![MockRound::new()
                .text("Let me check")
                .tool_call_fragments("call_1", 0, "get_weather", &["{\"ci"])
                .fail("connection reset")],
            SessionSettings::default(),
        );

        let outcome = h.agent.run("Weather?", CancellationToken::new(), None).await;

        match &outcome {
            SessionOutcome::Aborted {
                reason: AbortReason::Model(_),
                history,
            } => {
                // System prompt and user message only
                assert_eq!(history.len(), 2);
                assert_eq!(history[1].role, TurnRole::User);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(h.backend.invoked().is_empty());
    }

    #[tokio::test]
    async fn test_model_rejects_request() {
        let h = harness(vec![MockRound::rejected("overloaded")], SessionSettings::default());

        let outcome = h.agent.run("Hi", CancellationToken::new(), None).await;

        assert!(matches!(
            outcome.abort_reason(),
            Some(AbortReason::Model(ProviderError::ApiError { status: 503, .. }))
        ));
        assert_eq!(outcome.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_dispatching() {
        let h = harness(
            vec![
                MockRound::new().tool_call("call_1", "run_shell", json!({"command": "sleep 100"})),
                MockRound::new().text("never requested"),
            ],
            SessionSettings::default(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = h.agent.run("Run it", cancel, None).await;

        assert_eq!(outcome.abort_reason(), Some(&AbortReason::Cancelled));
        let history = outcome.history();
        assert!(history[2].has_tool_calls());
        let results = tool_turns(history);
        assert_eq!(results.len(), 1);
        assert!(results[0].content.starts_with("Error [cancelled]"));
        assert_eq!(h.provider.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_streaming_keeps_partial_turn() {
        let h = harness(
            vec![MockRound::new()
                .text("Working on it")
                .tool_call("call_1", "now_time", json!({}))
                .hang()],
            SessionSettings::default(),
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = h.agent.run("Time?", cancel, None).await;

        assert_eq!(outcome.abort_reason(), Some(&AbortReason::Cancelled));
        let history = outcome.history();
        assert_eq!(history[2].content, "Working on it");
        assert_eq!(history[2].tool_calls.len(), 1);
        assert_eq!(tool_turns(history).len(), 1);
    }

    #[tokio::test]
    async fn test_max_turns() {
        let settings = SessionSettings {
            max_turns: 2,
            ..Default::default()
        };
        let h = harness(
            vec![
                MockRound::new().tool_call("call_1", "now_time", json!({})),
                MockRound::new().tool_call("call_2", "now_time", json!({})),
                MockRound::new().text("unreachable"),
            ],
            settings,
        );

        let outcome = h.agent.run("Loop", CancellationToken::new(), None).await;

        assert_eq!(outcome.abort_reason(), Some(&AbortReason::MaxTurnsExceeded(2)));
        assert_eq!(h.provider.request_count(), 2);
        assert_eq!(outcome.history().last().map(|t| t.role), Some(TurnRole::ToolResult));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let settings = SessionSettings {
            deadline_secs: Some(1),
            ..Default::default()
        };
        let h = harness(
            vec![MockRound::new().tool_call("call_1", "run_shell", json!({"command": "sleep 100"}))],
            settings,
        );

        let outcome = h.agent.run("Run it", CancellationToken::new(), None).await;

        assert_eq!(outcome.abort_reason(), Some(&AbortReason::DeadlineExceeded));
        let results = tool_turns(outcome.history());
        assert!(results[0].content.starts_with("Error [cancelled]"));
    }

    #[tokio::test]
    async fn test_history_continues_across_questions() {
        let h = harness(
            vec![MockRound::new().text("Hello!"), MockRound::new().text("Still here.")],
            SessionSettings::default(),
        );

        let first = h.agent.run("Hi", CancellationToken::new(), None).await;
        let mut history = first.into_history();
        history.push(ConversationTurn::user("Are you there?"));

        let second = h.agent.run_with_history(history, CancellationToken::new(), None).await;
        assert_eq!(second.answer(), Some("Still here."));
        assert_eq!(second.history().len(), 5);
        assert_eq!(h.provider.prompts()[1].len(), 4);
    }

    #[tokio::test]
    async fn test_observer_sees_phases() {
        let h = harness(
            vec![
                MockRound::new().tool_call("call_1", "now_time", json!({})),
                MockRound::new().text("Noon."),
            ],
            SessionSettings::default(),
        );

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        h.agent.run("Time?", CancellationToken::new(), Some(tx)).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&SessionEvent::ToolCallStarted {
            id: "call_1".into(),
            name: "now_time".into()
        }));
        assert!(events.contains(&SessionEvent::PhaseChanged(Phase::Dispatching)));
        assert!(events.contains(&SessionEvent::TextDelta("Noon.".into())));
        assert_eq!(events.last(), Some(&SessionEvent::PhaseChanged(Phase::Done)));
    }
}
