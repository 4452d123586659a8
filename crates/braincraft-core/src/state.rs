//! UI-agnostic conversation state
//!
//! This module contains the message types shared by any front end. The store
//! is append-only: messages are never edited or removed during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub diagram_code: Option<String>,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.sender == Sender::Assistant
    }
}

#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    sequence: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>, at: DateTime<Utc>) -> &Message {
        self.push(content.into(), Sender::User, None, at)
    }

    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        diagram_code: Option<String>,
        at: DateTime<Utc>,
    ) -> &Message {
        self.push(content.into(), Sender::Assistant, diagram_code, at)
    }

    fn push(
        &mut self,
        content: String,
        sender: Sender,
        diagram_code: Option<String>,
        at: DateTime<Utc>,
    ) -> &Message {
        let id = format!("{}-{}", at.timestamp_millis(), self.sequence);
        self.sequence += 1;
        self.messages.push(Message {
            id,
            content,
            sender,
            timestamp: at,
            diagram_code,
        });
        // Just pushed, so the vector is non-empty
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent message from the assistant
    pub fn latest_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }
}
