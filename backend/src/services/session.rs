//! In-memory session store
//!
//! gvmd has no token of its own to hand out, so every session keeps the
//! credentials it logged in with and re-authenticates each GMP connection.
//! Sessions expire after a period of inactivity.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::gmp::Credentials;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub credentials: Credentials,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    timeout: TimeDelta,
}

impl SessionStore {
    pub fn new(timeout: TimeDelta) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn create(&self, credentials: Credentials) -> Session {
        self.purge_expired();

        let session = Session {
            id: Uuid::new_v4(),
            credentials,
            expires_at: Utc::now() + self.timeout,
        };
        self.sessions.write().insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, username = session.username(), "Session created");
        session
    }

    /// Look up a live session and extend its expiry
    pub fn touch(&self, id: Uuid) -> Option<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();

        match sessions.get_mut(&id) {
            Some(session) if session.expires_at > now => {
                session.expires_at = now + self.timeout;
                Some(session.clone())
            }
            Some(_) => {
                sessions.remove(&id);
                tracing::debug!(session_id = %id, "Session expired");
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}
