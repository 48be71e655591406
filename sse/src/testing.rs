//! Test doubles for transports and stores.

use crate::error::{Error, RelayErrorKind, Result};
use crate::message::Frame;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use store::{Backlog, QueuedMessage, Session, SessionStore, StoreErrorKind};

/// Transport that keeps every frame it is asked to send.
pub struct RecordingTransport {
    session_id: String,
    frames: Mutex<Vec<Frame>>,
}

impl RecordingTransport {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    /// Payloads of relayed messages, in send order.
    pub fn payloads(&self) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Message { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&self, frame: &Frame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Transport whose message sends fail at chosen positions (0-based, counting
/// only message frames).
pub struct FlakyTransport {
    inner: RecordingTransport,
    fail_at: Vec<usize>,
    attempts: AtomicUsize,
}

impl FlakyTransport {
    pub fn failing_on(session_id: &str, fail_at: &[usize]) -> Self {
        Self {
            inner: RecordingTransport::new(session_id),
            fail_at: fail_at.to_vec(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.inner.payloads()
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    fn session_id(&self) -> &str {
        self.inner.session_id()
    }

    async fn send(&self, frame: &Frame) -> Result<()> {
        if matches!(frame, Frame::Message { .. }) {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_at.contains(&attempt) {
                return Err(Error::new(
                    RelayErrorKind::TransportSendFailure,
                    "simulated transport fault",
                ));
            }
        }
        self.inner.send(frame).await
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Store whose every call fails as if the network were down.
pub struct UnavailableStore;

fn unavailable() -> store::Error {
    store::Error::new(StoreErrorKind::Network, "connection refused")
}

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn put_session(&self, _session: &Session, _ttl: Duration) -> store::Result<()> {
        Err(unavailable())
    }

    async fn session_exists(&self, _id: &str) -> store::Result<bool> {
        Err(unavailable())
    }

    async fn enqueue(&self, _message: &QueuedMessage) -> store::Result<()> {
        Err(unavailable())
    }

    async fn pending(&self, _id: &str) -> store::Result<Backlog> {
        Err(unavailable())
    }

    async fn acknowledge(&self, _id: &str, _count: usize) -> store::Result<()> {
        Err(unavailable())
    }
}
