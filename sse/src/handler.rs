use crate::connection::{LocalSession, SessionRegistry};
use crate::error::{Error, RelayErrorKind, Result};
use crate::message::Frame;
use crate::reconcile::{LoopContext, ReconciliationLoop};
use crate::transport::{ChannelTransport, EventReceiver, Transport};
use crate::RelaySettings;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::{Session, SessionStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one stream. Transitions only move forward, and nothing
/// leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initializing,
    HandshakeSent,
    Draining,
    Streaming,
    Closed,
}

/// Moves the published state to `next` unless the connection already closed.
pub(crate) fn advance(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state.send_if_modified(|current| {
        if *current == ConnectionState::Closed || *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// Request context needed to open a stream.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRequest {
    pub host: Option<String>,
    pub user_agent: Option<String>,
}

/// A stream that completed its handshake, ready to be served.
pub struct OpenConnection {
    pub session_id: String,
    /// Frames for the response body, starting with the handshake.
    pub events: EventReceiver,
    /// Closes the session when dropped.
    pub guard: ConnectionGuard,
    /// Cancelled when the node shuts down; the response body should end.
    pub shutdown: CancellationToken,
}

/// Sets up streams: allocates the session, registers it locally and in the
/// durable store, sends the handshake and starts the reconciliation task.
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn SessionStore>,
    settings: RelaySettings,
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn SessionStore>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            store,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Signals every stream opened by this handler to end.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Opens a stream backed by a [`ChannelTransport`].
    pub async fn open(&self, request: &ConnectionRequest) -> Result<OpenConnection> {
        let session = self.allocate(request)?;
        let session_id = session.id.clone();
        let (transport, events) = ChannelTransport::new(session_id.clone());
        let guard = self.establish(session, Arc::new(transport)).await?;

        Ok(OpenConnection {
            session_id,
            events,
            guard,
            shutdown: self.shutdown.child_token(),
        })
    }

    /// Validates the request and allocates a session with a fresh id.
    pub fn allocate(&self, request: &ConnectionRequest) -> Result<Session> {
        let host = request
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::new(RelayErrorKind::Configuration, "Missing host header"))?;

        Ok(Session::new(host, request.user_agent.clone()))
    }

    /// Drives `session` from `Initializing` to `HandshakeSent` over `transport`
    /// and spawns the task that drains and then streams.
    ///
    /// Failing to record the session durably is fatal: other nodes could never
    /// route to it. On any error the local registration is rolled back.
    pub async fn establish(
        &self,
        session: Session,
        transport: Arc<dyn Transport>,
    ) -> Result<ConnectionGuard> {
        let state = Arc::new(watch::channel(ConnectionState::Initializing).0);
        let local = LocalSession::new(transport.clone());

        if !self.registry.register(session.id.clone(), local.clone()) {
            return Err(Error::new(
                RelayErrorKind::Configuration,
                format!("Session {} is already bound on this node", session.id),
            ));
        }

        if let Err(e) = self
            .store
            .put_session(&session, self.settings.session_ttl)
            .await
        {
            self.registry.unregister(&session.id);
            error!("Failed to record session {} in store: {e}", session.id);
            return Err(e.into());
        }

        if let Err(e) = transport.send(&Frame::handshake(&session.id)).await {
            self.registry.unregister(&session.id);
            return Err(e);
        }
        advance(&state, ConnectionState::HandshakeSent);
        info!("SSE connection established, sessionId: {}", session.id);

        let session_id = session.id.clone();
        let reconciliation = ReconciliationLoop::spawn(LoopContext {
            session,
            local,
            store: self.store.clone(),
            poll_interval: self.settings.poll_interval,
            session_ttl: self.settings.session_ttl,
            state: state.clone(),
        });

        Ok(ConnectionGuard {
            session_id,
            registry: self.registry.clone(),
            reconciliation,
            state,
            closed: AtomicBool::new(false),
        })
    }
}

/// Owns one open session. Closing it cancels the reconciliation task and
/// drops the local binding; the durable record is left to expire so enqueues
/// racing the close are not rejected.
pub struct ConnectionGuard {
    session_id: String,
    registry: Arc<SessionRegistry>,
    reconciliation: ReconciliationLoop,
    state: Arc<watch::Sender<ConnectionState>>,
    closed: AtomicBool,
}

impl ConnectionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Whether the reconciliation task is still running. It ends shortly
    /// after [`ConnectionGuard::close`].
    pub fn is_reconciling(&self) -> bool {
        !self.reconciliation.is_finished()
    }

    /// Performs the `Closed` transition. Repeated calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.reconciliation.cancel();
        self.registry.unregister(&self.session_id);
        self.state.send_replace(ConnectionState::Closed);
        info!("SSE connection closed, sessionId: {}", self.session_id);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}
