//! Mock provider for testing
//!
//! Provides deterministic, scripted responses without network dependencies.
//! Every history it is prompted with is recorded so tests can inspect what
//! the agent loop sent back to the model.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::traits::{Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};
use crate::logging::Logger;
use crate::types::{CancellationToken, ConversationTurn, StreamChunk, ToolCall, TurnRole};

/// One scripted step of a response
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Emit a chunk
    Chunk(StreamChunk),
    /// Pause before the next step
    Delay(Duration),
    /// Fail the stream with this message
    Fail(String),
    /// Never produce anything again
    Hang,
}

/// Scripted response to one model request
#[derive(Debug, Clone, Default)]
pub struct MockRound {
    steps: Vec<MockStep>,
    /// Refuse to start the stream with this message
    reject: Option<String>,
}

impl MockRound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round that fails before streaming anything
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            reject: Some(message.into()),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.steps.push(MockStep::Chunk(StreamChunk::text(text)));
        self
    }

    /// A tool call reported complete in one chunk
    pub fn tool_call(mut self, id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        self.steps
            .push(MockStep::Chunk(StreamChunk::tool_call(ToolCall::new(id, name, input))));
        self
    }

    /// A tool call streamed as a name fragment followed by argument fragments
    pub fn tool_call_fragments(mut self, id: &str, index: u32, name: &str, fragments: &[&str]) -> Self {
        self.steps
            .push(MockStep::Chunk(StreamChunk::tool_call_start(id, index, name)));
        for fragment in fragments {
            self.steps
                .push(MockStep::Chunk(StreamChunk::tool_call_args(id, index, *fragment)));
        }
        self
    }

    pub fn chunk(mut self, chunk: StreamChunk) -> Self {
        self.steps.push(MockStep::Chunk(chunk));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(MockStep::Delay(delay));
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(MockStep::Fail(message.into()));
        self
    }

    pub fn hang(mut self) -> Self {
        self.steps.push(MockStep::Hang);
        self
    }
}

/// Mock response mode
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user message
    #[default]
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Return response as specific chunks
    Chunks(Vec<String>),
    /// Play one scripted round per request, in order
    Rounds(Vec<MockRound>),
    /// Simulate an error after some text chunks
    Error { message: String, delay_chunks: usize },
    /// Return nothing (empty response)
    Empty,
}

/// Configuration for the mock provider
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Response mode
    pub mode: MockMode,
    /// Delay between chunks in milliseconds (0 = no delay)
    pub chunk_delay_ms: u64,
    /// Size of each chunk when splitting fixed/echo responses
    pub chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Echo,
            chunk_delay_ms: 0,
            chunk_size: 10,
        }
    }
}

/// Mock LLM provider for testing
pub struct MockProvider {
    config: MockConfig,
    rounds: Mutex<VecDeque<MockRound>>,
    prompts: Mutex<Vec<Vec<ConversationTurn>>>,
    logger: Arc<dyn Logger>,
}

impl MockProvider {
    /// Create a new mock provider with default config
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(MockConfig::default(), logger)
    }

    /// Create with specific config
    pub fn with_config(config: MockConfig, logger: Arc<dyn Logger>) -> Self {
        let rounds = match &config.mode {
            MockMode::Rounds(rounds) => rounds.iter().cloned().collect(),
            _ => VecDeque::new(),
        };
        Self {
            config,
            rounds: Mutex::new(rounds),
            prompts: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Create an echo provider (echoes back user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Echo,
                ..Default::default()
            },
            logger,
        )
    }

    /// Create a fixed response provider
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Fixed(response.into()),
                ..Default::default()
            },
            logger,
        )
    }

    /// Create a scripted provider playing `rounds` in order
    pub fn rounds(rounds: Vec<MockRound>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Rounds(rounds),
                ..Default::default()
            },
            logger,
        )
    }

    /// Create an error-producing provider
    pub fn error(message: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Error {
                    message: message.into(),
                    delay_chunks: 0,
                },
                ..Default::default()
            },
            logger,
        )
    }

    /// Set chunk delay
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.config.chunk_delay_ms = delay_ms;
        self
    }

    /// Set chunk size for splitting responses
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Every history this provider was prompted with, in order
    pub fn prompts(&self) -> Vec<Vec<ConversationTurn>> {
        self.prompts.lock().clone()
    }

    /// Number of stream requests made
    pub fn request_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Extract last user message content
    fn get_last_user_message(&self, history: &[ConversationTurn]) -> String {
        history
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User && !t.content.is_empty())
            .map(|t| t.content.clone())
            .unwrap_or_else(|| "Hello from MockProvider!".to_string())
    }

    /// Split text into chunks
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        if self.config.chunk_size == 0 || text.is_empty() {
            return vec![text.to_string()];
        }

        text.chars()
            .collect::<Vec<_>>()
            .chunks(self.config.chunk_size)
            .map(|c| c.iter().collect())
            .collect()
    }

    /// Text chunks separated by the configured delay
    fn text_steps(&self, chunks: Vec<String>) -> Vec<MockStep> {
        let delay = Duration::from_millis(self.config.chunk_delay_ms);
        let mut steps = Vec::with_capacity(chunks.len() * 2);
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                steps.push(MockStep::Delay(delay));
            }
            steps.push(MockStep::Chunk(StreamChunk::text(chunk)));
        }
        steps
    }

    fn next_round(&self, history: &[ConversationTurn]) -> MockRound {
        match &self.config.mode {
            MockMode::Echo => {
                let user_msg = self.get_last_user_message(history);
                self.logger
                    .debug(&format!("MockProvider: Echo mode, echoing: {}", user_msg));
                MockRound {
                    steps: self.text_steps(self.split_into_chunks(&format!("Echo: {}", user_msg))),
                    reject: None,
                }
            }
            MockMode::Fixed(response) => MockRound {
                steps: self.text_steps(self.split_into_chunks(response)),
                reject: None,
            },
            MockMode::Chunks(chunks) => MockRound {
                steps: self.text_steps(chunks.clone()),
                reject: None,
            },
            MockMode::Rounds(_) => self.rounds.lock().pop_front().unwrap_or_else(|| {
                self.logger.warn("MockProvider: scripted rounds exhausted");
                MockRound::new().fail("no scripted round left")
            }),
            MockMode::Error { message, delay_chunks } => {
                let chunks = (0..*delay_chunks)
                    .map(|i| format!("Chunk {} before error. ", i))
                    .collect();
                let mut steps = self.text_steps(chunks);
                steps.push(MockStep::Fail(message.clone()));
                MockRound { steps, reject: None }
            }
            MockMode::Empty => MockRound::new(),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        history: &[ConversationTurn],
        _model: &ProviderModelConfig,
        _options: &StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<StreamResponse> {
        self.prompts.lock().push(history.to_vec());

        let round = self.next_round(history);
        if let Some(message) = round.reject {
            return Err(ProviderError::api_error("mock", 503, message));
        }

        self.logger
            .debug(&format!("MockProvider: streaming {} steps", round.steps.len()));

        let stream = stream::iter(round.steps)
            .then(move |step| {
                let cancel = cancel_token.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Some(Err(ProviderError::Cancelled));
                    }
                    match step {
                        MockStep::Chunk(chunk) => Some(Ok(chunk)),
                        MockStep::Delay(delay) => {
                            tokio::time::sleep(delay).await;
                            None
                        }
                        MockStep::Fail(message) => Some(Err(ProviderError::stream("mock", message))),
                        MockStep::Hang => {
                            std::future::pending::<()>().await;
                            None
                        }
                    }
                }
            })
            .filter_map(|item| async move { item });

        Ok(Box::pin(stream))
    }
}
