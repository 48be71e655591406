//! Session relay over Server-Sent Events for a horizontally scaled fleet.
//!
//! A client opens a long-lived stream with `GET /sse` and later posts
//! messages addressed to its session id. The post may land on any node, so
//! every message goes through a durable per-session queue shared by the
//! fleet. The node that holds the stream drains the queue on a fixed
//! interval and writes what it finds down the stream.
//!
//! # Message Flow
//!
//! 1. [`ConnectionHandler`] allocates a session id, binds it in this node's
//!    [`SessionRegistry`], records it in the store and sends the handshake.
//! 2. A [`ReconciliationLoop`] is spawned for the session. Its first pass
//!    drains anything queued before the stream existed; later passes run
//!    every poll interval.
//! 3. [`MessageRelay`] validates a posted message, checks the session is
//!    live in the store and enqueues it. When the stream is on the same node
//!    it is also written directly and the reconciliation pass skips the
//!    queued copy.
//! 4. When the client goes away the [`ConnectionGuard`] is dropped, which
//!    cancels the loop and unbinds the session locally.
//!
//! # Modules
//!
//! - `connection`: process-local registry of open streams
//! - `handler`: stream setup and the connection state machine
//! - `reconcile`: the per-session drain and poll task
//! - `relay`: the inbound message path
//! - `transport`: the write side of one stream
//! - `message`: frames written to streams

use std::time::Duration;

pub mod connection;
pub mod error;
pub mod handler;
pub mod manager;
pub mod message;
pub mod reconcile;
pub mod relay;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{LocalSession, SessionRegistry};
pub use error::{Error, RelayErrorKind, Result};
pub use handler::{
    ConnectionGuard, ConnectionHandler, ConnectionRequest, ConnectionState, OpenConnection,
};
pub use manager::Manager;
pub use message::Frame;
pub use reconcile::ReconciliationLoop;
pub use relay::{MessageRelay, RelayOutcome};
pub use transport::{ChannelTransport, Transport};

/// Timing shared by every session on this node.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Delay between reconciliation passes.
    pub poll_interval: Duration,
    /// Expiry of the durable session record.
    pub session_ttl: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            session_ttl: Duration::from_secs(3600),
        }
    }
}
