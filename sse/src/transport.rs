use crate::error::{Error, RelayErrorKind, Result};
use crate::message::Frame;
use async_trait::async_trait;
use axum::response::sse::Event;
use std::convert::Infallible;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub type EventSender = UnboundedSender<std::result::Result<Event, Infallible>>;
pub type EventReceiver = UnboundedReceiver<std::result::Result<Event, Infallible>>;

/// One open server-push stream bound to a single session id.
#[async_trait]
pub trait Transport: Send + Sync {
    fn session_id(&self) -> &str;

    /// Writes one frame to the stream. Each frame is written as its own SSE
    /// event, so a successful send needs no separate flush.
    async fn send(&self, frame: &Frame) -> Result<()>;

    /// Whether the client end of the stream is gone.
    fn is_closed(&self) -> bool;
}

/// Transport backed by the channel an SSE response body drains.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    session_id: String,
    sender: EventSender,
}

impl ChannelTransport {
    /// Returns the transport and the receiving half for the response body.
    pub fn new(session_id: impl Into<String>) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                session_id: session_id.into(),
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&self, frame: &Frame) -> Result<()> {
        let event = frame.to_event()?;
        self.sender.send(Ok(event)).map_err(|_| {
            Error::new(
                RelayErrorKind::TransportSendFailure,
                format!("stream for session {} is closed", self.session_id),
            )
        })
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_hands_event_to_receiver() {
        let (transport, mut receiver) = ChannelTransport::new("abc");
        transport
            .send(&Frame::payload(json!({"foo": 1})))
            .await
            .unwrap();

        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_send_fails_once_receiver_is_dropped() {
        let (transport, receiver) = ChannelTransport::new("abc");
        drop(receiver);

        assert!(transport.is_closed());
        let err = transport
            .send(&Frame::payload(json!({"foo": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::TransportSendFailure);
    }
}
