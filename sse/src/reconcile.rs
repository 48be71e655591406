use crate::connection::LocalSession;
use crate::error::Result;
use crate::handler::{advance, ConnectionState};
use crate::message::Frame;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use store::{Session, SessionStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of one pass over a session's queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Frames handed to the transport.
    pub sent: usize,
    /// Frames whose send failed; they are trimmed like the rest.
    pub failed: usize,
}

/// Sends every queued message for the session, oldest first, then trims
/// exactly the entries that were read.
///
/// A failed send is logged and skipped so one bad frame never holds back the
/// rest of the queue. Only a store failure aborts the pass, leaving the queue
/// untouched for the next attempt. A stream whose client already went away
/// is not read from at all.
///
/// Messages that also went down the stream through the same-process fast
/// path are sent again here. Delivery is at-least-once, and clients discard
/// repeats by the event `id`.
pub async fn deliver_pending(
    store: &dyn SessionStore,
    session_id: &str,
    local: &LocalSession,
) -> Result<PassReport> {
    let mut report = PassReport::default();

    if local.transport.is_closed() {
        debug!("Skipping pass for session {session_id}: stream is closed");
        return Ok(report);
    }

    let backlog = store.pending(session_id).await?;
    if backlog.is_empty() {
        return Ok(report);
    }

    for message in &backlog.messages {
        match local.transport.send(&Frame::from(message)).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                warn!(
                    "Failed to deliver queued message {} to session {session_id}: {e}",
                    message.id
                );
                report.failed += 1;
            }
        }
    }

    store.acknowledge(session_id, backlog.depth).await?;
    Ok(report)
}

/// Everything one session's background task needs.
pub struct LoopContext {
    pub session: Session,
    pub local: LocalSession,
    pub store: Arc<dyn SessionStore>,
    pub poll_interval: Duration,
    /// Lifetime of the session record; renewed at half-life while the stream is open.
    pub session_ttl: Duration,
    pub state: Arc<watch::Sender<ConnectionState>>,
}

/// Repeating task that bridges a session's durable queue and its stream.
///
/// The first pass is the drain of anything queued before the stream was
/// ready; later passes run every `poll_interval`. Errors never end the task;
/// only [`ReconciliationLoop::cancel`] does.
pub struct ReconciliationLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReconciliationLoop {
    pub fn spawn(context: LoopContext) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(context, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stops the task. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run(context: LoopContext, cancel: CancellationToken) {
    let LoopContext {
        session,
        local,
        store,
        poll_interval,
        session_ttl,
        state,
    } = context;
    let session_id = session.id.as_str();

    advance(&state, ConnectionState::Draining);
    match deliver_pending(store.as_ref(), session_id, &local).await {
        Ok(report) if report.sent + report.failed > 0 => {
            info!(
                "Drained {} pending message(s) for session {session_id} ({} failed)",
                report.sent, report.failed
            );
        }
        Ok(_) => {}
        Err(e) => warn!("Initial drain failed for session {session_id}: {e}; retrying next tick"),
    }
    advance(&state, ConnectionState::Streaming);

    let mut renewed_at = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }

        match deliver_pending(store.as_ref(), session_id, &local).await {
            Ok(report) if report.sent > 0 => {
                debug!("Delivered {} message(s) to session {session_id}", report.sent);
            }
            Ok(_) => {}
            Err(e) => warn!("Reconciliation pass failed for session {session_id}: {e}"),
        }

        if renewed_at.elapsed() >= session_ttl / 2 {
            match store.put_session(&session, session_ttl).await {
                Ok(()) => renewed_at = Instant::now(),
                Err(e) => warn!("Failed to renew session {session_id} in store: {e}"),
            }
        }
    }

    debug!("Reconciliation loop stopped for session {session_id}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SessionRegistry;
    use crate::error::{Error, RelayErrorKind};
    use crate::relay::MessageRelay;
    use crate::testing::{FlakyTransport, RecordingTransport, UnavailableStore};
    use crate::transport::ChannelTransport;
    use serde_json::{json, Value};
    use store::{MemoryStore, QueuedMessage};

    async fn enqueue(store: &MemoryStore, session_id: &str, payloads: &[Value]) {
        for payload in payloads {
            store
                .enqueue(&QueuedMessage::new(session_id, payload.clone()))
                .await
                .unwrap();
        }
    }

    fn context(
        store: Arc<dyn SessionStore>,
        session: Session,
        local: LocalSession,
        poll_interval: Duration,
    ) -> LoopContext {
        LoopContext {
            session,
            local,
            store,
            poll_interval,
            session_ttl: Duration::from_secs(60),
            state: Arc::new(watch::channel(ConnectionState::HandshakeSent).0),
        }
    }

    #[tokio::test]
    async fn test_deliver_pending_sends_in_enqueue_order_and_trims() {
        let store = MemoryStore::default();
        enqueue(&store, "s1", &[json!(1), json!(2), json!(3)]).await;
        let transport = Arc::new(RecordingTransport::new("s1"));
        let local = LocalSession::new(transport.clone());

        let report = deliver_pending(&store, "s1", &local).await.unwrap();

        assert_eq!(report.sent, 3);
        assert_eq!(transport.payloads(), vec![json!(1), json!(2), json!(3)]);
        assert!(store.pending("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_block_next_message() {
        let store = MemoryStore::default();
        enqueue(&store, "s1", &[json!("a"), json!("b"), json!("c")]).await;
        let transport = Arc::new(FlakyTransport::failing_on("s1", &[0]));
        let local = LocalSession::new(transport.clone());

        let report = deliver_pending(&store, "s1", &local).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);
        assert_eq!(transport.payloads(), vec![json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn test_fast_path_copy_does_not_reorder_queue() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("localhost", None);
        store
            .put_session(&session, Duration::from_secs(60))
            .await
            .unwrap();
        // Accepted by another node before the local post.
        enqueue(&store, &session.id, &[json!({"m": 1})]).await;

        let registry = Arc::new(SessionRegistry::new());
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let local = LocalSession::new(transport.clone());
        registry.register(session.id.clone(), local.clone());
        let relay = MessageRelay::new(registry, store.clone());
        relay
            .relay(Some(&session.id), br#"{"m":2}"#)
            .await
            .unwrap();

        let report = deliver_pending(store.as_ref(), &session.id, &local)
            .await
            .unwrap();

        assert_eq!(report.sent, 2);
        let payloads = transport.payloads();
        assert_eq!(payloads[0], json!({"m": 2}));
        assert_eq!(payloads[1..], [json!({"m": 1}), json!({"m": 2})]);
        assert!(store.pending(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream_leaves_queue_for_later() {
        let store = MemoryStore::default();
        enqueue(&store, "s1", &[json!("kept")]).await;
        let (transport, events) = ChannelTransport::new("s1");
        drop(events);
        let local = LocalSession::new(Arc::new(transport));

        let report = deliver_pending(&store, "s1", &local).await.unwrap();

        assert_eq!(report, PassReport::default());
        assert_eq!(store.pending("s1").await.unwrap().depth, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_store_unavailable() {
        let transport = Arc::new(RecordingTransport::new("s1"));
        let local = LocalSession::new(transport);

        let err: Error = deliver_pending(&UnavailableStore, "s1", &local)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::StoreUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_delivers_new_messages_within_one_interval() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("localhost", None);
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let local = LocalSession::new(transport.clone());
        let context = context(
            store.clone(),
            session.clone(),
            local,
            Duration::from_secs(2),
        );
        let mut state = context.state.subscribe();

        let reconciliation = ReconciliationLoop::spawn(context);
        state
            .wait_for(|s| *s == ConnectionState::Streaming)
            .await
            .unwrap();

        enqueue(&store, &session.id, &[json!({"foo": 1})]).await;
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(transport.payloads(), vec![json!({"foo": 1})]);
        reconciliation.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_store_outage() {
        let session = Session::new("localhost", None);
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let context = context(
            Arc::new(UnavailableStore),
            session,
            LocalSession::new(transport),
            Duration::from_secs(1),
        );

        let reconciliation = ReconciliationLoop::spawn(context);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!reconciliation.is_finished());
        reconciliation.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_task() {
        let session = Session::new("localhost", None);
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let context = context(
            Arc::new(MemoryStore::default()),
            session,
            LocalSession::new(transport),
            Duration::from_secs(2),
        );

        let reconciliation = ReconciliationLoop::spawn(context);
        reconciliation.cancel();
        reconciliation.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(reconciliation.is_cancelled());
        assert!(reconciliation.is_finished());
        reconciliation.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_renews_session_record_before_expiry() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("localhost", None);
        store
            .put_session(&session, Duration::from_secs(4))
            .await
            .unwrap();
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let mut context = context(
            store.clone(),
            session.clone(),
            LocalSession::new(transport),
            Duration::from_secs(1),
        );
        context.session_ttl = Duration::from_secs(4);

        let reconciliation = ReconciliationLoop::spawn(context);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(store.session_exists(&session.id).await.unwrap());
        reconciliation.cancel();
    }
}
