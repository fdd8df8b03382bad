//! libSQL session store — snapshot persistence.
//!
//! Sessions are cached as live handles and persisted as JSON snapshots
//! after each turn. On a cache miss the snapshot is reloaded, so sessions
//! survive process restarts. Supports local file and in-memory databases.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;

use super::model::Session;
use super::store::{SessionHandle, SessionStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    snapshot TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// libSQL-backed session store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlSessionStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    cache: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
}

impl LibSqlSessionStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Backend(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SessionError::Backend(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| SessionError::Backend(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
            cache: RwLock::new(HashMap::new()),
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Session database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, SessionError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| SessionError::Backend(format!("Failed to create database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| SessionError::Backend(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
            cache: RwLock::new(HashMap::new()),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), SessionError> {
        self.conn
            .execute(SCHEMA, ())
            .await
            .map_err(|e| SessionError::Backend(format!("Schema init failed: {e}")))?;
        Ok(())
    }

    async fn load_snapshot(&self, id: Uuid) -> Result<Option<Session>, SessionError> {
        let mut rows = self
            .conn
            .query(
                "SELECT snapshot FROM sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };

        let snapshot: String = row
            .get(0)
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        let session: Session = serde_json::from_str(&snapshot)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        Ok(Some(session))
    }

    async fn write_snapshot(&self, session: &Session) -> Result<(), SessionError> {
        let snapshot = serde_json::to_string(session)
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO sessions (id, snapshot, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET snapshot = excluded.snapshot,
                                               updated_at = excluded.updated_at",
                params![
                    session.id.to_string(),
                    snapshot,
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for LibSqlSessionStore {
    async fn create(&self) -> Result<Arc<SessionHandle>, SessionError> {
        let session = Session::new();
        self.write_snapshot(&session).await?;
        let handle = Arc::new(SessionHandle::new(session));
        self.cache
            .write()
            .await
            .insert(handle.id(), Arc::clone(&handle));
        Ok(handle)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Arc<SessionHandle>>, SessionError> {
        if let Some(handle) = self.cache.read().await.get(&id) {
            return Ok(Some(Arc::clone(handle)));
        }

        // Cache miss — reload from the snapshot, guarding against a racing
        // loader having populated the cache in the meantime.
        let Some(session) = self.load_snapshot(id).await? else {
            return Ok(None);
        };
        let mut cache = self.cache.write().await;
        let handle = cache
            .entry(id)
            .or_insert_with(|| Arc::new(SessionHandle::new(session)));
        Ok(Some(Arc::clone(handle)))
    }

    async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        self.write_snapshot(session).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        self.cache.write().await.remove(&id);
        self.conn
            .execute(
                "DELETE FROM sessions WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn count(&self) -> usize {
        let Ok(mut rows) = self.conn.query("SELECT COUNT(*) FROM sessions", ()).await else {
            return 0;
        };
        match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).unwrap_or(0) as usize,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::node::NodeId;

    #[tokio::test]
    async fn snapshot_roundtrip_through_cache_eviction() {
        let store = LibSqlSessionStore::new_memory().await.unwrap();
        let handle = store.create().await.unwrap();
        let id = handle.id();

        {
            let mut session = handle.lock().await;
            session.push_user_turn("51824753556");
            session.current_node = NodeId::ServiceDiscovery;
            store.persist(&session).await.unwrap();
        }

        // Simulate a restart: drop the live cache and reload from snapshot.
        store.cache.write().await.clear();
        let reloaded = store.get(id).await.unwrap().unwrap();
        let session = reloaded.lock().await;
        assert_eq!(session.current_node, NodeId::ServiceDiscovery);
        assert_eq!(session.turn_counter, 1);
        assert_eq!(session.last_user_message(), Some("51824753556"));
    }

    #[tokio::test]
    async fn delete_removes_snapshot() {
        let store = LibSqlSessionStore::new_memory().await.unwrap();
        let handle = store.create().await.unwrap();
        let id = handle.id();
        assert_eq!(store.count().await, 1);

        store.delete(id).await.unwrap();
        assert_eq!(store.count().await, 0);
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let store = LibSqlSessionStore::new_local(&path).await.unwrap();
        let handle = store.create().await.unwrap();
        let id = handle.id();
        drop(store);

        let reopened = LibSqlSessionStore::new_local(&path).await.unwrap();
        assert!(reopened.get(id).await.unwrap().is_some());
    }
}
