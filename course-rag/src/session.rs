//! Conversation sessions with bounded history.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Identifier of a conversation session.
pub type SessionId = String;

/// Who sent a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
}

/// Per-session conversation history, bounded to `max_history` exchanges.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<ChatMessage>>>>,
    max_history: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self { sessions: Arc::default(), max_history }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub async fn create_session(&self) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(session_id.clone(), Vec::new());
        debug!(session_id = %session_id, "created session");
        session_id
    }

    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Append a message, creating the session if needed and dropping the
    /// oldest messages beyond the bound.
    pub async fn add_message(&self, session_id: &str, speaker: Speaker, content: impl Into<String>) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(ChatMessage { speaker, content: content.into() });

        let limit = self.max_history * 2;
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }
    }

    /// Append a question and its answer.
    pub async fn add_exchange(&self, session_id: &str, question: &str, answer: &str) {
        self.add_message(session_id, Speaker::User, question).await;
        self.add_message(session_id, Speaker::Assistant, answer).await;
    }

    /// History formatted as `"User: ...\nAssistant: ..."` lines, or `None` for
    /// an unknown or empty session.
    pub async fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        let history = sessions.get(session_id).filter(|h| !h.is_empty())?;
        Some(
            history
                .iter()
                .map(|m| format!("{}: {}", m.speaker.label(), m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Forget a session's messages. The session itself stays known.
    pub async fn clear_session(&self, session_id: &str) {
        if let Some(history) = self.sessions.write().await.get_mut(session_id) {
            history.clear();
        }
    }
}
