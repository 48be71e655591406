use crate::error::Result;
use crate::{Backlog, QueuedMessage, Session, SessionStore, StoreSettings};
use async_trait::async_trait;
use log::*;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Redis-backed store. Session records are plain string keys with an expiry;
/// each session's queue is a list pushed at the tail and trimmed at the head.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    settings: StoreSettings,
}

impl RedisStore {
    pub async fn connect(url: &str, settings: StoreSettings) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = timeout(settings.timeout, ConnectionManager::new(client)).await??;

        info!(
            "Connected to Redis session store (prefix={}, timeout={:?})",
            settings.key_prefix, settings.timeout
        );

        Ok(Self { conn, settings })
    }

    fn session_key(&self, id: &str) -> String {
        session_key(&self.settings.key_prefix, id)
    }

    fn queue_key(&self, id: &str) -> String {
        queue_key(&self.settings.key_prefix, id)
    }

    /// Runs one round-trip under the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        Ok(timeout(self.settings.timeout, call).await??)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn put_session(&self, session: &Session, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.session_key(&session.id);
        let record = serde_json::to_string(session)?;

        let _: () = self
            .bounded(
                redis::cmd("SET")
                    .arg(&key)
                    .arg(record)
                    .arg("EX")
                    .arg(expiry_secs(ttl))
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn session_exists(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = self.session_key(id);

        let count: u64 = self
            .bounded(redis::cmd("EXISTS").arg(&key).query_async(&mut conn))
            .await?;
        Ok(count > 0)
    }

    async fn enqueue(&self, message: &QueuedMessage) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.queue_key(&message.session_id);
        let entry = serde_json::to_string(message)?;

        let _: () = self
            .bounded(
                redis::pipe()
                    .atomic()
                    .cmd("RPUSH")
                    .arg(&key)
                    .arg(entry)
                    .ignore()
                    .cmd("EXPIRE")
                    .arg(&key)
                    .arg(expiry_secs(self.settings.queue_ttl))
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn pending(&self, id: &str) -> Result<Backlog> {
        let mut conn = self.conn.clone();
        let key = self.queue_key(id);

        let entries: Vec<String> = self
            .bounded(
                redis::cmd("LRANGE")
                    .arg(&key)
                    .arg(0)
                    .arg(-1)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(decode_backlog(id, entries))
    }

    async fn acknowledge(&self, id: &str, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let key = self.queue_key(id);

        // LTRIM keeps [count, end]; entries pushed after the read stay queued.
        let _: () = self
            .bounded(
                redis::cmd("LTRIM")
                    .arg(&key)
                    .arg(count)
                    .arg(-1)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }
}

fn session_key(prefix: &str, id: &str) -> String {
    format!("{prefix}:session:{id}")
}

fn queue_key(prefix: &str, id: &str) -> String {
    format!("{prefix}:queue:{id}")
}

/// Redis rejects `EX 0`, so sub-second expiries round up to one second.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn decode_backlog(id: &str, entries: Vec<String>) -> Backlog {
    let depth = entries.len();
    let messages = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_str::<QueuedMessage>(&entry) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping undecodable queue entry for session {id}: {e}");
                None
            }
        })
        .collect();

    Backlog { messages, depth }
}
