use crate::connection::SessionRegistry;
use crate::handler::ConnectionHandler;
use crate::relay::MessageRelay;
use crate::RelaySettings;
use log::*;
use std::sync::Arc;
use store::SessionStore;

/// Entry point for the web layer: owns this node's registry and hands out
/// the two paths that share it.
pub struct Manager {
    registry: Arc<SessionRegistry>,
    connections: ConnectionHandler,
    relay: MessageRelay,
}

impl Manager {
    pub fn new(store: Arc<dyn SessionStore>, settings: RelaySettings) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        info!(
            "SSE manager ready (poll interval {:?}, session ttl {:?})",
            settings.poll_interval, settings.session_ttl
        );

        Self {
            connections: ConnectionHandler::new(registry.clone(), store.clone(), settings),
            relay: MessageRelay::new(registry.clone(), store),
            registry,
        }
    }

    /// The `GET` side: opens streams.
    pub fn connections(&self) -> &ConnectionHandler {
        &self.connections
    }

    /// The `POST` side: routes messages to streams.
    pub fn relay(&self) -> &MessageRelay {
        &self.relay
    }

    /// Ends every open stream so the server can drain.
    pub fn shutdown(&self) {
        info!("Closing {} open stream(s)", self.registry.len());
        self.connections.shutdown();
    }

    /// Streams currently held by this node.
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ConnectionRequest, ConnectionState};
    use crate::testing::RecordingTransport;
    use serde_json::json;
    use std::time::Duration;
    use store::MemoryStore;

    fn request() -> ConnectionRequest {
        ConnectionRequest {
            host: Some("localhost".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_paths_share_one_registry() {
        let manager = Manager::new(Arc::new(MemoryStore::default()), RelaySettings::default());

        let connection = manager.connections().open(&request()).await.unwrap();
        assert_eq!(manager.active_sessions(), 1);

        let outcome = manager
            .relay()
            .relay(Some(&connection.session_id), json!({"foo": 1}).to_string().as_bytes())
            .await
            .unwrap();
        assert!(outcome.delivered_locally);

        drop(connection);
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_posted_to_other_node_arrives_through_queue() {
        let store = Arc::new(MemoryStore::default());
        let settings = RelaySettings {
            poll_interval: Duration::from_secs(2),
            session_ttl: Duration::from_secs(60),
        };
        let owner = Manager::new(store.clone(), settings);
        let other = Manager::new(store.clone(), settings);

        let session = owner.connections().allocate(&request()).unwrap();
        let transport = Arc::new(RecordingTransport::new(&session.id));
        let guard = owner
            .connections()
            .establish(session.clone(), transport.clone())
            .await
            .unwrap();
        guard
            .subscribe()
            .wait_for(|s| *s == ConnectionState::Streaming)
            .await
            .unwrap();

        let outcome = other
            .relay()
            .relay(Some(&session.id), br#"{"foo":1}"#)
            .await
            .unwrap();
        assert!(outcome.queued);
        assert!(!outcome.delivered_locally);
        assert!(transport.payloads().is_empty());

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(transport.payloads(), vec![json!({"foo": 1})]);
        assert!(store.pending(&session.id).await.unwrap().is_empty());
        assert_eq!(other.active_sessions(), 0);
        guard.close();
    }
}
