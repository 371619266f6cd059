//! Conversation state: an ordered, role-tagged message history.
//!
//! The conversation is seeded with the assistant greeting, grows by
//! appending one user and (on success) one assistant message per turn,
//! and only ever shrinks via an explicit reset back to the seed.

use serde::{Deserialize, Serialize};

use crate::config;

/// The role of a chat message sender. Serializes to the lowercase
/// names the Ollama chat API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in the conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only message history for one session.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Start a conversation containing only the seed greeting.
    pub fn seeded() -> Self {
        Self {
            messages: vec![ChatMessage::new(
                ChatRole::Assistant,
                config::INITIAL_MESSAGE,
            )],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages
            .push(ChatMessage::new(ChatRole::Assistant, content));
    }

    /// Discard everything and return to the seed state.
    pub fn reset(&mut self) {
        *self = Self::seeded();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_conversation_holds_only_the_greeting() {
        let conv = Conversation::seeded();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role, ChatRole::Assistant);
        assert_eq!(conv.messages()[0].content, config::INITIAL_MESSAGE);
    }

    #[test]
    fn successful_turn_grows_history_by_two() {
        let mut conv = Conversation::seeded();
        let before = conv.len();
        conv.push_user("my printer is on fire");
        conv.push_assistant("Unplug it immediately.");
        assert_eq!(conv.len(), before + 2);
    }

    #[test]
    fn failed_turn_grows_history_by_one() {
        let mut conv = Conversation::seeded();
        let before = conv.len();
        conv.push_user("hello?");
        // No assistant message is appended when the backend yields no stream.
        assert_eq!(conv.len(), before + 1);
    }

    #[test]
    fn reset_returns_to_seed_regardless_of_length() {
        let mut conv = Conversation::seeded();
        for i in 0..5 {
            conv.push_user(format!("question {i}"));
            conv.push_assistant(format!("answer {i}"));
        }
        conv.reset();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content, config::INITIAL_MESSAGE);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::new(ChatRole::User, "hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user""#));
    }
}
