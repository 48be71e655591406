use crate::connection::SessionRegistry;
use crate::error::{Error, Result};
use crate::message::Frame;
use log::*;
use serde_json::Value;
use std::sync::Arc;
use store::{QueuedMessage, SessionStore};

/// What happened to an accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Appended to the session's durable queue.
    pub queued: bool,
    /// Also pushed straight down a stream held by this process.
    pub delivered_locally: bool,
}

/// Accepts messages addressed to a session and routes them to whichever node
/// holds its stream.
///
/// Every accepted message goes through the durable queue, and the queued copy
/// is what carries the per-session ordering. When the target stream lives in
/// this process it is also written to directly, so the same message may reach
/// the stream twice under one event `id`.
#[derive(Clone)]
pub struct MessageRelay {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn SessionStore>,
}

impl MessageRelay {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn SessionStore>) -> Self {
        Self { registry, store }
    }

    /// Validates and routes one raw message body.
    ///
    /// Checks run in this order: the session id must be present, then the
    /// session must have a live durable record, then the body must parse as
    /// JSON. Nothing reaches the queue unless all three pass.
    pub async fn relay(&self, session_id: Option<&str>, raw: &[u8]) -> Result<RelayOutcome> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(Error::missing_parameter)?;

        let parsed = serde_json::from_slice::<Value>(raw);

        if !self.store.session_exists(session_id).await? {
            debug!("Rejected message for unknown session {session_id}");
            return Err(Error::unknown_session());
        }

        let message = QueuedMessage::new(session_id, parsed?);

        self.store.enqueue(&message).await?;
        let delivered_locally = self.deliver_locally(&message).await;
        debug!("Queued message {} for session {session_id}", message.id);

        Ok(RelayOutcome {
            queued: true,
            delivered_locally,
        })
    }

    /// Writes the message to a stream held by this process, if any. A failed
    /// write is not an error: the queued copy still reaches the stream.
    async fn deliver_locally(&self, message: &QueuedMessage) -> bool {
        let Some(local) = self.registry.lookup(&message.session_id) else {
            return false;
        };

        match local.transport.send(&Frame::from(message)).await {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    "Direct delivery to session {} failed, leaving it to the queue: {e}",
                    message.session_id
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LocalSession;
    use crate::error::RelayErrorKind;
    use crate::testing::{RecordingTransport, UnavailableStore};
    use serde_json::json;
    use std::time::Duration;
    use store::{MemoryStore, Session};

    async fn store_with_session() -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new("localhost", None);
        store
            .put_session(&session, Duration::from_secs(60))
            .await
            .unwrap();
        (store, session)
    }

    #[tokio::test]
    async fn test_missing_session_id_is_rejected_first() {
        let relay = MessageRelay::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(UnavailableStore),
        );

        let err = relay.relay(None, b"not json").await.unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::MissingParameter);

        let err = relay.relay(Some(""), b"{}").await.unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::MissingParameter);
    }

    #[tokio::test]
    async fn test_unknown_session_leaves_queue_untouched() {
        let store = Arc::new(MemoryStore::default());
        let relay = MessageRelay::new(Arc::new(SessionRegistry::new()), store.clone());

        let err = relay
            .relay(Some("ghost"), br#"{"foo":1}"#)
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, RelayErrorKind::UnknownSession);
        assert!(store.pending("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_wins_over_malformed_body() {
        let relay = MessageRelay::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(MemoryStore::default()),
        );

        let err = relay.relay(Some("ghost"), b"{nope").await.unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::UnknownSession);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_queued() {
        let (store, session) = store_with_session().await;
        let relay = MessageRelay::new(Arc::new(SessionRegistry::new()), store.clone());

        let err = relay.relay(Some(&session.id), b"{nope").await.unwrap_err();

        assert_eq!(err.error_kind, RelayErrorKind::MalformedPayload);
        assert!(store.pending(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_for_remote_session_is_queued() {
        let (store, session) = store_with_session().await;
        let relay = MessageRelay::new(Arc::new(SessionRegistry::new()), store.clone());

        let outcome = relay
            .relay(Some(&session.id), br#"{"foo":1}"#)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RelayOutcome {
                queued: true,
                delivered_locally: false
            }
        );
        let backlog = store.pending(&session.id).await.unwrap();
        assert_eq!(backlog.messages[0].payload, json!({"foo": 1}));
    }

    #[tokio::test]
    async fn test_local_session_gets_direct_delivery_and_queued_copy() {
        let (store, session) = store_with_session().await;
        let registry = Arc::new(SessionRegistry::new());
        let transport = Arc::new(RecordingTransport::new(&session.id));
        registry.register(session.id.clone(), LocalSession::new(transport.clone()));
        let relay = MessageRelay::new(registry, store.clone());

        let outcome = relay
            .relay(Some(&session.id), br#"{"foo":1}"#)
            .await
            .unwrap();

        assert!(outcome.delivered_locally);
        assert_eq!(transport.payloads(), vec![json!({"foo": 1})]);
        let backlog = store.pending(&session.id).await.unwrap();
        assert_eq!(backlog.messages[0].payload, json!({"foo": 1}));
        match &transport.frames()[0] {
            Frame::Message { id, .. } => assert_eq!(*id, Some(backlog.messages[0].id)),
            other => panic!("expected a message frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_store_unavailable() {
        let relay = MessageRelay::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(UnavailableStore),
        );

        let err = relay.relay(Some("s1"), b"{}").await.unwrap_err();
        assert_eq!(err.error_kind, RelayErrorKind::StoreUnavailable);
    }
}
