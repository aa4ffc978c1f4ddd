//! Reassembles streamed fragments into text and complete tool calls

use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::logging::{Logger, SharedLogger};
use crate::providers::{ProviderResult, StreamResponse};
use crate::types::{FailureKind, StreamChunk, StreamEvent, ToolCall};
use crate::{log_debug, log_warn};

/// Stream of reassembled events
pub type EventStream = Pin<Box<dyn Stream<Item = ProviderResult<StreamEvent>> + Send>>;

/// Tool call whose arguments are still arriving
#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingCall {
    /// Parse the buffer if it looks complete
    fn try_complete(&self) -> Option<Value> {
        let trimmed = self.arguments.trim();
        if !trimmed.ends_with('}') {
            return None;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        }
    }

    fn into_call(self, input: Value) -> ToolCall {
        ToolCall::new(self.id, self.name, input)
    }
}

/// Parse a complete call's arguments as reported by the provider
///
/// Providers hand over either a parsed object or the raw argument text when
/// they could not parse it themselves. `None` means the arguments never
/// formed an object.
fn complete_input(input: Value) -> Option<Value> {
    match input {
        Value::Object(_) => Some(input),
        Value::Null => Some(Value::Object(Default::default())),
        Value::String(raw) if raw.trim().is_empty() => Some(Value::Object(Default::default())),
        Value::String(raw) => match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

/// Push-style reassembly state machine
///
/// Feed chunks with [`push`](Self::push) and call [`finish`](Self::finish)
/// once the source is exhausted.
pub struct StreamReassembler {
    /// Unfinished calls in first-seen order
    pending: Vec<PendingCall>,
    /// Ordinal index → id of the first fragment seen at that index
    index_ids: HashMap<u32, String>,
    /// First-seen position of every id
    seqs: HashMap<String, usize>,
    /// Ids already emitted as completed
    completed: HashSet<String>,
    /// Ids already reported as orphaned
    orphaned: HashSet<String>,
    /// Counter for complete calls that arrive without an id
    anonymous: usize,
    logger: SharedLogger,
}

impl StreamReassembler {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            pending: Vec::new(),
            index_ids: HashMap::new(),
            seqs: HashMap::new(),
            completed: HashSet::new(),
            orphaned: HashSet::new(),
            anonymous: 0,
            logger,
        }
    }

    /// Process one chunk, returning the events it completes
    pub fn push(&mut self, chunk: StreamChunk) -> Vec<StreamEvent> {
        match chunk {
            StreamChunk::Text { text } if text.is_empty() => Vec::new(),
            StreamChunk::Text { text } => vec![StreamEvent::Text(text)],
            StreamChunk::ToolCall { tool_call } => self.push_complete(tool_call).into_iter().collect(),
            StreamChunk::ToolCallDelta {
                id,
                index,
                name,
                input_delta,
            } => self.push_delta(id, index, name, input_delta).into_iter().collect(),
        }
    }

    /// Flush unfinished calls at end of stream
    ///
    /// An empty argument buffer is treated as `{}`. Anything else that still
    /// does not parse as an object is reported as incomplete.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let pending = std::mem::take(&mut self.pending);
        let mut events = Vec::with_capacity(pending.len());

        for call in pending {
            let input = if call.arguments.trim().is_empty() {
                Some(Value::Object(Default::default()))
            } else {
                call.try_complete()
            };

            let seq = self.seq_of(&call.id);
            match input {
                Some(input) => {
                    self.completed.insert(call.id.clone());
                    events.push(StreamEvent::ToolCallCompleted {
                        seq,
                        call: call.into_call(input),
                    });
                }
                None => {
                    log_warn!(
                        self.logger,
                        "Tool call {} ({}) ended with incomplete arguments: {}",
                        call.id,
                        call.name,
                        call.arguments
                    );
                    events.push(self.incomplete(seq, call.id, call.name));
                }
            }
        }

        events
    }

    /// Position of `id` in first-seen order, assigning the next one if new
    fn seq_of(&mut self, id: &str) -> usize {
        let next = self.seqs.len();
        *self.seqs.entry(id.to_string()).or_insert(next)
    }

    fn incomplete(&self, seq: usize, id: String, name: String) -> StreamEvent {
        StreamEvent::ToolCallFailed {
            seq,
            message: format!("arguments for '{}' never formed a complete JSON object", name),
            id,
            name: Some(name),
            kind: FailureKind::IncompleteToolCall,
        }
    }

    fn push_complete(&mut self, mut call: ToolCall) -> Option<StreamEvent> {
        if call.id.is_empty() {
            self.anonymous += 1;
            call.id = format!("call_{}", self.anonymous);
        }

        if !self.completed.insert(call.id.clone()) {
            log_warn!(self.logger, "Ignoring duplicate completion for tool call {}", call.id);
            return None;
        }

        // A complete report supersedes any partial buffer for the same id
        self.pending.retain(|p| p.id != call.id);
        let seq = self.seq_of(&call.id);

        match complete_input(call.input) {
            Some(input) => Some(StreamEvent::ToolCallCompleted {
                seq,
                call: ToolCall { input, ..call },
            }),
            None => {
                log_warn!(
                    self.logger,
                    "Tool call {} ({}) arrived with unparseable arguments",
                    call.id,
                    call.name
                );
                Some(self.incomplete(seq, call.id, call.name))
            }
        }
    }

    fn push_delta(
        &mut self,
        id: String,
        index: u32,
        name: Option<String>,
        input_delta: Option<String>,
    ) -> Option<StreamEvent> {
        let id = if id.is_empty() {
            match self.index_ids.get(&index) {
                Some(known) => known.clone(),
                None => format!("#{}", index),
            }
        } else {
            id
        };

        if self.completed.contains(&id) {
            log_debug!(self.logger, "Ignoring fragment for already completed tool call {}", id);
            return None;
        }
        if self.orphaned.contains(&id) {
            return None;
        }

        let position = match self.pending.iter().position(|p| p.id == id) {
            Some(position) => {
                if let Some(more) = name.filter(|n| !n.is_empty()) {
                    let call = &mut self.pending[position];
                    if call.arguments.trim().is_empty() {
                        call.name.push_str(&more);
                    } else {
                        log_debug!(self.logger, "Ignoring late name fragment '{}' for {}", more, id);
                    }
                }
                position
            }
            None => match name.filter(|n| !n.is_empty()) {
                Some(name) => {
                    self.seq_of(&id);
                    self.index_ids.entry(index).or_insert_with(|| id.clone());
                    self.pending.push(PendingCall {
                        id: id.clone(),
                        name,
                        arguments: String::new(),
                    });
                    self.pending.len() - 1
                }
                None => {
                    log_warn!(self.logger, "Dropping fragment for unknown tool call {}", id);
                    let seq = self.seq_of(&id);
                    self.orphaned.insert(id.clone());
                    return Some(StreamEvent::ToolCallFailed {
                        seq,
                        message: format!("fragment for tool call '{}' arrived before its name", id),
                        id,
                        name: None,
                        kind: FailureKind::OrphanFragment,
                    });
                }
            },
        };

        let delta = input_delta.filter(|d| !d.is_empty())?;
        self.pending[position].arguments.push_str(&delta);

        let input = self.pending[position].try_complete()?;
        let call = self.pending.remove(position);
        self.completed.insert(call.id.clone());
        Some(StreamEvent::ToolCallCompleted {
            seq: self.seq_of(&call.id),
            call: call.into_call(input),
        })
    }
}

/// Adapt a provider chunk stream into a stream of reassembled events
///
/// Upstream errors are passed through unchanged.
pub fn reassemble(stream: StreamResponse, logger: SharedLogger) -> EventStream {
    let state = (stream, StreamReassembler::new(logger), VecDeque::new(), false);

    Box::pin(futures::stream::unfold(
        state,
        |(mut stream, mut reassembler, mut queue, mut ended)| async move {
            loop {
                if let Some(event) = queue.pop_front() {
                    return Some((Ok(event), (stream, reassembler, queue, ended)));
                }
                if ended {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(chunk)) => queue.extend(reassembler.push(chunk)),
                    Some(Err(e)) => return Some((Err(e), (stream, reassembler, queue, ended))),
                    None => {
                        ended = true;
                        queue.extend(reassembler.finish());
                    }
                }
            }
        },
    ))
}
