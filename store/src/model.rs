use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque session identifier handed to clients in the handshake frame.
pub type SessionId = String;

/// Metadata recorded for every open stream so any node can tell the session is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub host: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Allocates a session with a fresh v4 id.
    pub fn new(host: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            host: host.into(),
            user_agent,
            created_at: Utc::now(),
        }
    }
}

/// A client-to-server message waiting in a session's durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Per-message id, sent as the SSE event id so clients can discard repeats.
    pub id: Uuid,
    pub session_id: SessionId,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn new(session_id: impl Into<SessionId>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}
