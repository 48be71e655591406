use crate::error::Result;
use crate::{Backlog, QueuedMessage, Session, SessionId, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process store with the same expiry and FIFO semantics as the networked
/// backend. Only shares state within one process.
#[derive(Debug)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, Expiring<Session>>,
    queues: DashMap<SessionId, Expiring<VecDeque<QueuedMessage>>>,
    queue_ttl: Duration,
}

impl MemoryStore {
    pub fn new(queue_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            queues: DashMap::new(),
            queue_ttl,
        }
    }

    fn evict_expired_queue(&self, id: &str) {
        self.queues.remove_if(id, |_, queue| queue.is_expired());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put_session(&self, session: &Session, ttl: Duration) -> Result<()> {
        self.sessions
            .insert(session.id.clone(), Expiring::new(session.clone(), ttl));
        Ok(())
    }

    async fn session_exists(&self, id: &str) -> Result<bool> {
        self.sessions.remove_if(id, |_, session| session.is_expired());
        Ok(self.sessions.contains_key(id))
    }

    async fn enqueue(&self, message: &QueuedMessage) -> Result<()> {
        self.evict_expired_queue(&message.session_id);

        let mut queue = self
            .queues
            .entry(message.session_id.clone())
            .or_insert_with(|| Expiring::new(VecDeque::new(), self.queue_ttl));
        queue.value.push_back(message.clone());
        queue.expires_at = Instant::now() + self.queue_ttl;
        Ok(())
    }

    async fn pending(&self, id: &str) -> Result<Backlog> {
        self.evict_expired_queue(id);

        let messages: Vec<QueuedMessage> = self
            .queues
            .get(id)
            .map(|queue| queue.value.iter().cloned().collect())
            .unwrap_or_default();

        Ok(Backlog {
            depth: messages.len(),
            messages,
        })
    }

    async fn acknowledge(&self, id: &str, count: usize) -> Result<()> {
        if let Some(mut queue) = self.queues.get_mut(id) {
            let count = count.min(queue.value.len());
            queue.value.drain(..count);
        }
        self.queues.remove_if(id, |_, queue| queue.value.is_empty());
        Ok(())
    }
}
