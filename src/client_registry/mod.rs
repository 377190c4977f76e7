//! ClientRegistry - Viewer Session Accounting
//!
//! ## Responsibilities
//!
//! - Track currently attached viewer sessions
//! - Enforce the maximum concurrent session count at registration
//! - Guarantee cleanup: no dangling entries after a session ends
//!
//! ## Design
//!
//! Registration hands out a [`SessionGuard`]; dropping the guard
//! deregisters the session. A viewer's streaming body is dropped, not
//! driven to completion, when the connection closes, so the map uses a
//! `std::sync::Mutex` (short critical sections, no await while held)
//! and cleanup runs synchronously inside `Drop`.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One attached viewer session
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
    pub last_delivered_seq: u64,
}

/// Registry of live viewer sessions
pub struct ClientRegistry {
    sessions: Mutex<HashMap<Uuid, ClientSession>>,
    max_clients: u64,
}

impl ClientRegistry {
    /// Create registry with a concurrent session limit
    pub fn new(max_clients: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_clients,
        }
    }

    /// Register a new viewer session
    ///
    /// Rejects with [`Error::OverCapacity`] before any session object is
    /// created when the limit is reached.
    pub fn register(self: Arc<Self>) -> Result<SessionGuard> {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        if sessions.len() as u64 >= self.max_clients {
            return Err(Error::OverCapacity(format!(
                "viewer limit reached ({} active)",
                sessions.len()
            )));
        }

        let session = ClientSession {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
            last_delivered_seq: 0,
        };
        let id = session.id;
        sessions.insert(id, session);
        let count = sessions.len();
        drop(sessions);

        tracing::info!(session_id = %id, client_count = count, "Viewer connected");

        Ok(SessionGuard { id, registry: self })
    }

    /// Record the last sequence number delivered to a session
    pub fn note_delivered(&self, id: &Uuid, seq: u64) {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        if let Some(session) = sessions.get_mut(id) {
            session.last_delivered_seq = seq;
        }
    }

    /// Number of live sessions
    pub fn count(&self) -> u64 {
        self.sessions.lock().expect("registry lock poisoned").len() as u64
    }

    fn deregister(&self, id: &Uuid) {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        if sessions.remove(id).is_some() {
            let count = sessions.len();
            drop(sessions);
            tracing::info!(session_id = %id, client_count = count, "Viewer disconnected");
        }
    }
}

/// RAII handle for a registered session; dropping it deregisters
pub struct SessionGuard {
    id: Uuid,
    registry: Arc<ClientRegistry>,
}

impl SessionGuard {
    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Record a delivered frame for this session
    pub fn note_delivered(&self, seq: u64) {
        self.registry.note_delivered(&self.id, seq);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.id);
    }
}
