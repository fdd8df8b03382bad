//! Session store abstraction.
//!
//! Replaces a free-floating shared mapping with an explicit interface:
//! get/put/delete by id, with a single-writer-per-id contract. Each handle
//! wraps its session in an async mutex; the engine holds the lock for the
//! whole turn, so inbound turns for one session are serialized while
//! independent sessions proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::error::SessionError;

use super::model::Session;

/// A shared handle to one session. The mutex is the single-writer
/// discipline: hold it for the duration of a turn.
pub struct SessionHandle {
    id: Uuid,
    state: Mutex<Session>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            id: session.id,
            state: Mutex::new(session),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().await
    }
}

/// Store abstraction for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session and return its handle.
    async fn create(&self) -> Result<Arc<SessionHandle>, SessionError>;

    /// Look up a session by id.
    async fn get(&self, id: Uuid) -> Result<Option<Arc<SessionHandle>>, SessionError>;

    /// Persist a snapshot of the session. Best-effort for in-memory stores.
    async fn persist(&self, session: &Session) -> Result<(), SessionError>;

    /// Delete a session. Sessions are never deleted automatically; this
    /// exists for explicit cleanup.
    async fn delete(&self, id: Uuid) -> Result<(), SessionError>;

    /// Number of live sessions.
    async fn count(&self) -> usize;
}

/// In-memory session store.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Result<Arc<SessionHandle>, SessionError> {
        let session = Session::new();
        let handle = Arc::new(SessionHandle::new(session));
        self.sessions
            .write()
            .await
            .insert(handle.id(), Arc::clone(&handle));
        Ok(handle)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Arc<SessionHandle>>, SessionError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn persist(&self, _session: &Session) -> Result<(), SessionError> {
        // Sessions already live in memory; nothing to do.
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_delete_roundtrip() {
        let store = InMemorySessionStore::new();
        let handle = store.create().await.unwrap();
        let id = handle.id();
        assert_eq!(store.count().await, 1);

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id(), id);

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = InMemorySessionStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handle_serializes_writers() {
        let store = InMemorySessionStore::new();
        let handle = store.create().await.unwrap();

        // Two tasks appending turns through the same handle never interleave
        // mid-turn: the counter ends up exactly 2 * iterations.
        let a = Arc::clone(&handle);
        let b = Arc::clone(&handle);
        let ta = tokio::spawn(async move {
            for _ in 0..50 {
                let mut session = a.lock().await;
                session.push_user_turn("from a");
            }
        });
        let tb = tokio::spawn(async move {
            for _ in 0..50 {
                let mut session = b.lock().await;
                session.push_user_turn("from b");
            }
        });
        ta.await.unwrap();
        tb.await.unwrap();

        let session = handle.lock().await;
        assert_eq!(session.turn_counter, 100);
        assert_eq!(session.transcript.len(), 100);
    }
}
