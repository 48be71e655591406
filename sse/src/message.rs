use crate::error::{Error, RelayErrorKind, Result};
use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;
use store::QueuedMessage;
use uuid::Uuid;

/// One unit pushed down a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// First frame on every stream, acknowledging the session id.
    Handshake(Handshake),
    /// A relayed client message. `id` becomes the SSE event id so clients can
    /// discard duplicate deliveries.
    Message { id: Option<Uuid>, payload: Value },
    /// Sent alone, in place of the handshake, when stream setup fails.
    Error(ErrorFrame),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handshake {
    pub jsonrpc: &'static str,
    pub id: String,
    pub result: HandshakeResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeResult {
    pub message: &'static str,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorFrame {
    pub error: String,
}

impl Frame {
    pub fn handshake(session_id: &str) -> Self {
        Frame::Handshake(Handshake {
            jsonrpc: "2.0",
            id: session_id.to_string(),
            result: HandshakeResult {
                message: "Connected",
                session_id: session_id.to_string(),
            },
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(ErrorFrame {
            error: message.into(),
        })
    }

    pub fn payload(payload: Value) -> Self {
        Frame::Message { id: None, payload }
    }

    pub fn data(&self) -> Result<String> {
        let data = match self {
            Frame::Handshake(handshake) => serde_json::to_string(handshake),
            Frame::Message { payload, .. } => serde_json::to_string(payload),
            Frame::Error(error) => serde_json::to_string(error),
        };
        data.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: RelayErrorKind::TransportSendFailure,
        })
    }

    pub fn to_event(&self) -> Result<Event> {
        let event = Event::default().data(self.data()?);
        Ok(match self {
            Frame::Message { id: Some(id), .. } => event.id(id.to_string()),
            _ => event,
        })
    }
}

impl From<&QueuedMessage> for Frame {
    fn from(message: &QueuedMessage) -> Self {
        Frame::Message {
            id: Some(message.id),
            payload: message.payload.clone(),
        }
    }
}
