//! Typed representation of the synchronized application state.
//!
//! A [`Document`] is the unit that moves between devices: every session with
//! its messages, the settings map, and the bookkeeping needed to reconcile two
//! copies that were edited independently.
//!
//! ## Invariants
//!
//! - Session ids are unique within a document
//! - Message ids are unique within their session
//! - Messages are kept in `created_at` order for display
//!
//! [`Document::validate`] checks the two uniqueness invariants; the snapshot
//! codec runs it on every decode.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Settings map: setting name to an arbitrary JSON value.
pub type Settings = BTreeMap<String, serde_json::Value>;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt.
    System,
    /// The human user.
    User,
    /// The model.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier, unique within the owning session.
    pub id: String,
    /// Who wrote the message.
    pub role: Role,
    /// Message body.
    pub content: String,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
}

impl Message {
    /// Creates a new message.
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            created_at,
        }
    }

    /// Returns true if both messages carry the same payload.
    ///
    /// The id is not compared; callers pair messages by id first.
    pub fn same_content(&self, other: &Message) -> bool {
        self.role == other.role
            && self.content == other.content
            && self.created_at == other.created_at
    }
}

/// A conversation: an ordered list of messages under a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Globally unique, never reused.
    pub id: String,
    /// User-visible title.
    #[serde(default)]
    pub topic: String,
    /// Messages in `created_at` order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last mutation time (Unix milliseconds).
    pub last_modified: u64,
}

impl Session {
    /// Creates an empty session.
    pub fn new(id: impl Into<String>, topic: impl Into<String>, now: u64) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            messages: Vec::new(),
            last_modified: now,
        }
    }

    /// Appends a message and advances `last_modified`.
    ///
    /// `last_modified` never moves backwards, even if `now` is older than
    /// the current value.
    pub fn push_message(&mut self, message: Message, now: u64) {
        self.messages.push(message);
        self.touch(now);
    }

    /// Renames the session.
    pub fn set_topic(&mut self, topic: impl Into<String>, now: u64) {
        self.topic = topic.into();
        self.touch(now);
    }

    /// Looks up a message by id.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn touch(&mut self, now: u64) {
        self.last_modified = self.last_modified.max(now);
    }
}

/// Sync bookkeeping carried inside the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Time of the last successful sync (Unix milliseconds).
    #[serde(default)]
    pub last_sync_time: Option<u64>,
    /// Provider used for the last successful sync.
    #[serde(default)]
    pub last_provider: Option<String>,
    /// Last time any setting was changed (Unix milliseconds).
    #[serde(default)]
    pub settings_updated_at: u64,
}

impl SyncMeta {
    /// Ordering key used to decide which side's settings win a merge.
    pub fn settings_marker(&self) -> (u64, u64) {
        (self.settings_updated_at, self.last_sync_time.unwrap_or(0))
    }
}

/// The full synchronized unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Sessions in user-visible recency order.
    pub sessions: Vec<Session>,
    /// Application settings.
    #[serde(default)]
    pub settings: Settings,
    /// Sync bookkeeping.
    #[serde(default)]
    pub sync_meta: SyncMeta,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a session by id.
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Looks up a session by id for mutation.
    pub fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Inserts a session, replacing any existing session with the same id.
    ///
    /// New sessions go to the front, matching recency order.
    pub fn upsert_session(&mut self, session: Session) {
        match self.session_mut(&session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.insert(0, session),
        }
    }

    /// Sets a setting and stamps the settings modification marker.
    pub fn set_setting(&mut self, key: impl Into<String>, value: serde_json::Value, now: u64) {
        self.settings.insert(key.into(), value);
        self.sync_meta.settings_updated_at = self.sync_meta.settings_updated_at.max(now);
    }

    /// Returns the session ids in document order.
    pub fn session_ids(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.id.as_str()).collect()
    }

    /// Total number of messages across all sessions.
    pub fn message_count(&self) -> usize {
        self.sessions.iter().map(|s| s.messages.len()).sum()
    }

    /// Returns true if the document has no sessions and no settings.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.settings.is_empty()
    }

    /// Checks the id uniqueness invariants.
    pub fn validate(&self) -> ProtocolResult<()> {
        let mut seen_sessions = HashSet::new();
        for session in &self.sessions {
            if !seen_sessions.insert(session.id.as_str()) {
                return Err(ProtocolError::DuplicateSession {
                    session_id: session.id.clone(),
                });
            }

            let mut seen_messages = HashSet::new();
            for message in &session.messages {
                if !seen_messages.insert(message.id.as_str()) {
                    return Err(ProtocolError::DuplicateMessage {
                        session_id: session.id.clone(),
                        message_id: message.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
