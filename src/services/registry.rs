//! Process-local session registry.
//!
//! Each session lives behind a [`SessionHandle`]. The handle's turn lock
//! serializes whole turns for one session id and may be held across awaits;
//! the inner session mutex only guards in-memory mutation and is never held
//! across an await.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::models::{Channel, Session, SessionSnapshot};

pub const DEFAULT_TTL_SECS: i64 = 1800;

pub struct SessionHandle {
    turn: tokio::sync::Mutex<()>,
    session: Mutex<Session>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            session: Mutex::new(session),
        }
    }

    /// Waits for any in-flight turn on this session to finish.
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub fn lock(&self) -> MutexGuard<'_, Session> {
        // A poisoned session still holds consistent data: every mutation is a
        // single push or assignment.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().to_snapshot()
    }
}

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Returns the live session for `id`, creating it in the start state if absent.
    /// An existing session keeps the channel it was opened on.
    pub fn get_or_create(&self, id: &str, channel: Channel) -> Arc<SessionHandle> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "creating session");
                Arc::new(SessionHandle::new(Session::new(id, channel, Utc::now())))
            })
            .value()
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Removes `id`; returns whether a session was present.
    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Evicts every session idle for longer than the TTL and returns their ids.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now - entry.value().lock().updated_at() > self.ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            // Re-check under the shard lock: a turn may have touched it meanwhile.
            let evicted = self
                .sessions
                .remove_if(&id, |_, handle| now - handle.lock().updated_at() > self.ttl);
            if evicted.is_some() {
                tracing::info!(session_id = %id, "evicted idle session");
                removed.push(id);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}
