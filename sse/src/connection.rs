use crate::transport::Transport;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use store::SessionId;

/// A stream held by this process.
#[derive(Clone)]
pub struct LocalSession {
    pub transport: Arc<dyn Transport>,
}

impl LocalSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

/// Process-local map from session id to the stream open on this node.
///
/// Registration, lookup and removal race across request tasks, so the map
/// is a `DashMap` and every operation is O(1) without a global lock.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, LocalSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Binds `id` to a stream. Returns `false` and leaves the existing binding
    /// in place if the id is already bound on this node.
    pub fn register(&self, id: SessionId, session: LocalSession) -> bool {
        match self.sessions.entry(id) {
            Entry::Occupied(entry) => {
                warn!(
                    "Refusing to rebind session {} that already has a local stream",
                    entry.key()
                );
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(session);
                true
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<LocalSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Removes the binding for `id`. Unregistering an unknown id is a no-op.
    pub fn unregister(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            debug!("Unregistered local stream for session {id}");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
