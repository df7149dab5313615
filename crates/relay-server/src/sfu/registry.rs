//! Session registry
//!
//! The only shared mutable table in the relay. Every access goes through a
//! single exclusive lock which is held for map operations only, never across
//! an await point or any transport I/O.

use super::session::Session;
use crate::error::RegistryError;
use parking_lot::Mutex;
use relay_protocol::SessionId;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Registry {
    sessions: Mutex<BTreeMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a session id; ids are never handed out twice
    pub fn next_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a session under its id
    pub fn add(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let id = session.id();
        match self.sessions.lock().entry(id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                slot.insert(session);
                tracing::debug!("Registered session {}", id);
                Ok(())
            }
        }
    }

    /// Remove a session; removing an absent id is a no-op
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.lock().remove(&id);
        if removed.is_some() {
            tracing::debug!("Unregistered session {}", id);
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Copy the current membership, ordered by id
    pub fn snapshot(&self) -> Snapshot {
        let sessions = self.sessions.lock().values().cloned().collect();
        Snapshot { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the registry taken at a single instant
///
/// May name sessions that were removed after it was taken; writes to those
/// fail without affecting anyone else.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    sessions: Vec<Arc<Session>>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.iter()
    }

    /// Every session except `origin`
    pub fn targets(&self, origin: SessionId) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.iter().filter(move |s| s.id() != origin)
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
