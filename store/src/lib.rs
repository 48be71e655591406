//! Durable session store shared by every node in the fleet.
//!
//! The store holds two things per session: the session metadata (with an
//! expiry, so a crashed node's sessions eventually disappear) and an
//! append-only queue of messages addressed to that session. Any node may
//! enqueue; only the node holding the session's stream consumes.
//!
//! # Consumption model
//!
//! Consumers read the queue with [`SessionStore::pending`] and then, once a send
//! has been attempted for every entry, trim exactly that many entries from the
//! head with [`SessionStore::acknowledge`]. Entries appended between the two
//! calls are left in place for the next pass, giving at-least-once delivery in
//! enqueue order.
//!
//! # Backends
//!
//! - [`RedisStore`]: networked, every call bounded by the configured timeout.
//! - [`MemoryStore`]: in-process, used for single-node development and tests.

use async_trait::async_trait;
use std::time::Duration;

pub mod error;
pub mod memory;
pub mod model;
pub mod redis_store;

pub use error::{Error, Result, StoreErrorKind};
pub use memory::MemoryStore;
pub use model::{QueuedMessage, Session, SessionId};
pub use redis_store::RedisStore;

/// Settings shared by the store backends.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Namespace prepended to every key.
    pub key_prefix: String,
    /// Expiry refreshed on a session's queue on every enqueue.
    pub queue_ttl: Duration,
    /// Upper bound for a single store round-trip.
    pub timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            key_prefix: "sse-relay".to_string(),
            queue_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of a session's queue, oldest first.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Backlog {
    pub messages: Vec<QueuedMessage>,
    /// Number of raw queue entries this snapshot covers. Can exceed
    /// `messages.len()` when undecodable entries were skipped; pass it to
    /// [`SessionStore::acknowledge`] so those entries are trimmed too.
    pub depth: usize,
}

impl Backlog {
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Records session metadata, replacing any previous record, expiring after `ttl`.
    async fn put_session(&self, session: &Session, ttl: Duration) -> Result<()>;

    /// Whether a live (unexpired) session record exists.
    async fn session_exists(&self, id: &str) -> Result<bool>;

    /// Appends a message to the tail of its session's queue.
    async fn enqueue(&self, message: &QueuedMessage) -> Result<()>;

    /// Reads every queued entry for a session without removing anything.
    async fn pending(&self, id: &str) -> Result<Backlog>;

    /// Removes the `count` oldest entries from a session's queue.
    async fn acknowledge(&self, id: &str, count: usize) -> Result<()>;

    /// Reads and removes every queued message for a session, oldest first.
    async fn dequeue_all(&self, id: &str) -> Result<Vec<QueuedMessage>> {
        let backlog = self.pending(id).await?;
        if !backlog.is_empty() {
            self.acknowledge(id, backlog.depth).await?;
        }
        Ok(backlog.messages)
    }
}
