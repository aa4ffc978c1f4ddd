//! Session state, events and outcomes

use tokio::sync::mpsc::UnboundedSender;

use crate::providers::ProviderError;
use crate::types::{ConversationHistory, ToolResult};

/// Phase of the orchestration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the model to start streaming
    AwaitingModel,
    /// Consuming the model stream, dispatching completed tool calls
    Streaming,
    /// Waiting for the tool calls of this round to resolve
    Dispatching,
    Done,
    Aborted,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::AwaitingModel => "awaiting_model",
            Phase::Streaming => "streaming",
            Phase::Dispatching => "dispatching",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Why a session ended before the model produced a final answer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbortReason {
    #[error("model failure: {0}")]
    Model(ProviderError),

    #[error("session deadline exceeded")]
    DeadlineExceeded,

    #[error("session cancelled")]
    Cancelled,

    #[error("exceeded {0} model rounds")]
    MaxTurnsExceeded(usize),
}

/// Result of running a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The model answered without requesting tools
    Done {
        answer: String,
        history: ConversationHistory,
    },
    /// The session stopped early; `history` is well-formed up to the abort
    Aborted {
        reason: AbortReason,
        history: ConversationHistory,
    },
}

impl SessionOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SessionOutcome::Done { .. })
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            SessionOutcome::Done { answer, .. } => Some(answer),
            SessionOutcome::Aborted { .. } => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            SessionOutcome::Aborted { reason, .. } => Some(reason),
            SessionOutcome::Done { .. } => None,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        match self {
            SessionOutcome::Done { history, .. } | SessionOutcome::Aborted { history, .. } => history,
        }
    }

    pub fn into_history(self) -> ConversationHistory {
        match self {
            SessionOutcome::Done { history, .. } | SessionOutcome::Aborted { history, .. } => history,
        }
    }
}

/// Progress notification sent to an optional observer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TextDelta(String),
    ToolCallStarted { id: String, name: String },
    ToolCallFinished(ToolResult),
    PhaseChanged(Phase),
}

/// Optional event sink; a dropped receiver is ignored
#[derive(Clone, Default)]
pub(crate) struct Observer(Option<UnboundedSender<SessionEvent>>);

impl Observer {
    pub(crate) fn new(sender: Option<UnboundedSender<SessionEvent>>) -> Self {
        Self(sender)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationTurn;

    #[test]
    fn test_outcome_accessors() {
        let done = SessionOutcome::Done {
            answer: "It is sunny".to_string(),
            history: vec![ConversationTurn::user("Weather?")],
        };
        assert!(done.is_done());
        assert_eq!(done.answer(), Some("It is sunny"));
        assert_eq!(done.history().len(), 1);

        let aborted = SessionOutcome::Aborted {
            reason: AbortReason::Cancelled,
            history: Vec::new(),
        };
        assert!(!aborted.is_done());
        assert_eq!(aborted.abort_reason(), Some(&AbortReason::Cancelled));
        assert!(aborted.into_history().is_empty());
    }

    #[test]
    fn test_abort_reason_display() {
        assert_eq!(AbortReason::MaxTurnsExceeded(10).to_string(), "exceeded 10 model rounds");
        assert_eq!(
            AbortReason::Model(ProviderError::Other("reset".into())).to_string(),
            format!("model failure: {}", ProviderError::Other("reset".into()))
        );
    }

    #[test]
    fn test_observer_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        Observer::new(Some(tx)).emit(SessionEvent::PhaseChanged(Phase::Done));
        Observer::default().emit(SessionEvent::TextDelta("x".into()));
    }
}
