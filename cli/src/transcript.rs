//! Conversation transcript: the ordered, append-only message list.

#[cfg(test)]
#[path = "transcript_test.rs"]
mod transcript_test;

use wire::Citation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when flattening history into a query.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single chat message.
///
/// User messages are immutable once pushed. Assistant message content only
/// grows by append while its turn streams; citations are replaced wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub citations: Option<Vec<Citation>>,
}

impl Message {
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), role: Role::User, content: content.to_owned(), citations: None }
    }

    /// An empty assistant message, filled in by the turn that owns it.
    #[must_use]
    pub fn assistant() -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), role: Role::Assistant, content: String::new(), citations: None }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Flatten the history plus `input` into one query string.
    ///
    /// The upstream has no multi-turn API, so every prior message becomes a
    /// `"<Role>: <content>"` line and the new input is appended unlabeled.
    #[must_use]
    pub fn flatten_query(&self, input: &str) -> String {
        if self.messages.is_empty() {
            return input.to_owned();
        }
        let mut query = self
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        query.push('\n');
        query.push_str(input);
        query
    }
}
