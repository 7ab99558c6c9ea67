//! Conversation memory: per-session message logs and the bounded
//! sliding-window extractor used to build model context.
//!
//! History is append-only and strictly insertion-ordered. The window
//! extractor forwards only complete user → assistant pairs from the tail
//! of the history, bounding the context cost of long conversations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RagError, Result};

/// Maximum length of a session title, in characters.
const TITLE_MAX_CHARS: usize = 80;

/// The author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message written by the end user.
    User,
    /// A message produced by the assistant.
    Assistant,
}

impl Role {
    /// Stable storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(RagError::Session(format!("unknown message role '{other}'"))),
        }
    }
}

/// A single conversation turn, append-only and insertion-ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The session this message belongs to.
    pub session_id: String,
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// Insertion timestamp (monotonic per session under serialized
    /// appends).
    pub timestamp: DateTime<Utc>,
}

/// A conversation session.
///
/// The title is set once, from the first user message, and never changes
/// afterwards. Sessions are destroyed only by explicit deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: String,
    /// Title derived from the first user message, or `None` for a fresh
    /// session with no user messages yet.
    pub title: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A session with its message count, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Unique session identifier.
    pub session_id: String,
    /// Session title, defaulting to "New Chat" while unset.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Number of messages in the session.
    pub message_count: usize,
}

/// Truncate a title to [`TITLE_MAX_CHARS`] characters.
fn truncate_title(content: &str) -> String {
    content.chars().take(TITLE_MAX_CHARS).collect()
}

/// Extract the trailing `window` complete user → assistant pairs.
///
/// Scans the history from the end and accepts an adjacent
/// `(user, assistant)` pair only in that exact order; unpaired messages
/// (for example a trailing user message still awaiting its answer) are
/// skipped. Returns at most `2 * window` messages, oldest pair first.
pub fn recent_pairs(history: &[Message], window: usize) -> Vec<Message> {
    let mut pairs: Vec<[&Message; 2]> = Vec::new();
    let mut i = history.len();

    while i >= 2 && pairs.len() < window {
        if history[i - 1].role == Role::Assistant && history[i - 2].role == Role::User {
            pairs.push([&history[i - 2], &history[i - 1]]);
            i -= 2;
        } else {
            i -= 1;
        }
    }

    pairs
        .into_iter()
        .rev()
        .flat_map(|pair| pair.into_iter().cloned())
        .collect()
}

/// Durable storage for sessions and their message logs.
///
/// Appends to different sessions are independent; appends to the same
/// session are expected to arrive in conversational order (caller's
/// responsibility), which keeps window pairing well-defined.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register an empty session. No-op if it already exists.
    async fn create_session(&self, session_id: &str) -> Result<()>;

    /// Append a message, creating the session row if absent.
    ///
    /// The first user message sets the session title (truncated to 80
    /// characters); later messages never change it.
    async fn append_message(&self, session_id: &str, role: Role, content: &str) -> Result<()>;

    /// Return the full message history for a session in insertion order.
    ///
    /// An unknown session yields an empty history, not an error.
    async fn history(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Return the trailing `window` complete user → assistant pairs,
    /// oldest pair first. See [`recent_pairs`] for the pairing rules.
    async fn recent_window(&self, session_id: &str, window: usize) -> Result<Vec<Message>> {
        let history = self.history(session_id).await?;
        Ok(recent_pairs(&history, window))
    }

    /// List all sessions, newest first, with message counts.
    async fn sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Delete a session and all of its messages.
    ///
    /// Deleting an unknown session is a no-op.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

struct SessionRecord {
    session: Session,
    messages: Vec<Message>,
}

/// An in-memory [`SessionStore`] for tests and ephemeral deployments.
///
/// The durable SQLite-backed store lives behind the `sqlite` feature.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_insert_with(|| SessionRecord {
            session: Session {
                session_id: session_id.to_string(),
                title: None,
                created_at: Utc::now(),
            },
            messages: Vec::new(),
        });
        Ok(())
    }

    async fn append_message(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.entry(session_id.to_string()).or_insert_with(|| SessionRecord {
            session: Session {
                session_id: session_id.to_string(),
                title: None,
                created_at: Utc::now(),
            },
            messages: Vec::new(),
        });

        if role == Role::User && record.session.title.is_none() {
            record.session.title = Some(truncate_title(content));
        }

        record.messages.push(Message {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Message>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map(|r| r.messages.clone()).unwrap_or_default())
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|record| SessionSummary {
                session_id: record.session.session_id.clone(),
                title: record
                    .session
                    .title
                    .clone()
                    .unwrap_or_else(|| "New Chat".to_string()),
                created_at: record.session.created_at,
                message_count: record.messages.len(),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(summaries)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: Role, content: &str) -> Message {
        Message {
            session_id: "s1".to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn trailing_unpaired_user_message_is_excluded() {
        let history = vec![
            message(Role::User, "A"),
            message(Role::Assistant, "B"),
            message(Role::User, "C"),
        ];
        let window = recent_pairs(&history, 3);
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B"]);
    }

    #[test]
    fn window_caps_the_number_of_pairs() {
        let mut history = Vec::new();
        for i in 0..5 {
            history.push(message(Role::User, &format!("q{i}")));
            history.push(message(Role::Assistant, &format!("a{i}")));
        }
        let window = recent_pairs(&history, 2);
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q3", "a3", "q4", "a4"]);
    }

    #[test]
    fn out_of_order_messages_do_not_pair() {
        let history = vec![
            message(Role::Assistant, "orphan answer"),
            message(Role::User, "Q"),
            message(Role::Assistant, "A"),
        ];
        let window = recent_pairs(&history, 3);
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Q", "A"]);
    }

    #[test]
    fn empty_history_yields_empty_window() {
        assert!(recent_pairs(&[], 3).is_empty());
    }

    #[tokio::test]
    async fn title_set_once_from_first_user_message() {
        let store = InMemorySessionStore::new();
        store.append_message("s1", Role::User, "first question").await.unwrap();
        store.append_message("s1", Role::Assistant, "answer").await.unwrap();
        store.append_message("s1", Role::User, "second question").await.unwrap();

        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "first question");
        assert_eq!(sessions[0].message_count, 3);
    }

    #[tokio::test]
    async fn title_is_truncated_to_eighty_chars() {
        let store = InMemorySessionStore::new();
        let long = "x".repeat(200);
        store.append_message("s1", Role::User, &long).await.unwrap();

        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions[0].title.chars().count(), 80);
    }

    #[tokio::test]
    async fn explicit_session_starts_untitled() {
        let store = InMemorySessionStore::new();
        store.create_session("s1").await.unwrap();
        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions[0].title, "New Chat");
        assert_eq!(sessions[0].message_count, 0);
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let store = InMemorySessionStore::new();
        store.append_message("s1", Role::User, "q").await.unwrap();
        store.append_message("s1", Role::Assistant, "a").await.unwrap();
        store.delete_session("s1").await.unwrap();

        assert!(store.history("s1").await.unwrap().is_empty());
        assert!(store.sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_window_reads_through_the_store() {
        let store = InMemorySessionStore::new();
        store.append_message("s1", Role::User, "A").await.unwrap();
        store.append_message("s1", Role::Assistant, "B").await.unwrap();
        store.append_message("s1", Role::User, "C").await.unwrap();

        let window = store.recent_window("s1", 3).await.unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["A", "B"]);
    }
}
