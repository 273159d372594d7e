//! Conversation session: single-flight turns over one transcript.
//!
//! DESIGN
//! ======
//! `Conversation` is the only owner of the transcript and of the current
//! turn's cancellation token. Read loops never touch the transcript; they
//! send `TurnUpdate`s that the UI loop feeds to [`Conversation::apply`], the
//! single update path. Updates tagged with a superseded turn are dropped, so
//! records that race a cancellation cannot reach the new assistant message.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wire::WireRecord;

use crate::transcript::{Message, Transcript};

/// Shown in place of the answer when a turn fails.
pub const ERROR_MESSAGE: &str = "Sorry, there was an error processing your request.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

/// Lifecycle of the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFirstByte,
    Streaming,
    Complete,
    Errored,
    Cancelled,
}

impl TurnState {
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::AwaitingFirstByte | Self::Streaming)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Errored | Self::Cancelled)
    }
}

/// Everything a read loop needs to run one turn.
#[derive(Debug)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub query: String,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub enum TurnEvent {
    Record(WireRecord),
    Completed,
    Failed(String),
}

#[derive(Debug)]
pub struct TurnUpdate {
    pub turn: TurnId,
    pub event: TurnEvent,
}

struct ActiveTurn {
    id: TurnId,
    assistant_id: String,
    cancel: CancellationToken,
}

pub struct Conversation {
    transcript: Transcript,
    current: Option<ActiveTurn>,
    state: TurnState,
    next_turn: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self { transcript: Transcript::new(), current: None, state: TurnState::Idle, next_turn: 0 }
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub fn current_turn(&self) -> Option<TurnId> {
        self.current.as_ref().map(|t| t.id)
    }

    /// The assistant message owned by the current (or last) turn.
    #[must_use]
    pub fn current_assistant(&self) -> Option<&Message> {
        let turn = self.current.as_ref()?;
        self.transcript.get(&turn.assistant_id)
    }

    /// Start a new turn for `input`, preempting any turn still in flight.
    ///
    /// Returns `None` for blank input. The query flattens the transcript as
    /// it stood before this turn's messages were appended.
    pub fn submit(&mut self, input: &str) -> Option<TurnRequest> {
        if input.trim().is_empty() {
            return None;
        }
        self.cancel();

        let query = self.transcript.flatten_query(input);
        self.transcript.push(Message::user(input));
        let assistant = Message::assistant();
        let assistant_id = assistant.id.clone();
        self.transcript.push(assistant);

        let id = TurnId(self.next_turn);
        self.next_turn += 1;
        let cancel = CancellationToken::new();
        self.current = Some(ActiveTurn { id, assistant_id, cancel: cancel.clone() });
        self.state = TurnState::AwaitingFirstByte;

        debug!(turn = ?id, query_len = query.len(), "turn submitted");
        Some(TurnRequest { turn: id, query, cancel })
    }

    /// Cancel the in-flight turn, if any. The partial message is kept as-is.
    pub fn cancel(&mut self) -> bool {
        match &self.current {
            Some(turn) if self.state.is_in_flight() => {
                turn.cancel.cancel();
                self.state = TurnState::Cancelled;
                debug!(turn = ?turn.id, "turn cancelled");
                true
            }
            _ => false,
        }
    }

    /// Merge one update into the transcript. Returns `true` when visible
    /// state changed.
    pub fn apply(&mut self, update: TurnUpdate) -> bool {
        let Some(turn) = &self.current else {
            return false;
        };
        if update.turn != turn.id || !self.state.is_in_flight() {
            debug!(turn = ?update.turn, "dropping update for inactive turn");
            return false;
        }
        let Some(message) = self.transcript.get_mut(&turn.assistant_id) else {
            return false;
        };

        match update.event {
            TurnEvent::Record(WireRecord::CitationUpdate(citations)) => {
                message.citations = Some(citations);
                self.state = TurnState::Streaming;
            }
            TurnEvent::Record(WireRecord::ContentDelta(delta)) => {
                message.content.push_str(&delta);
                self.state = TurnState::Streaming;
            }
            TurnEvent::Completed => {
                self.state = TurnState::Complete;
            }
            TurnEvent::Failed(reason) => {
                warn!(turn = ?update.turn, %reason, "turn failed");
                message.content = ERROR_MESSAGE.to_owned();
                self.state = TurnState::Errored;
            }
        }
        true
    }
}
