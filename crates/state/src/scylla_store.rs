//! Replicated state store backed by ScyllaDB
//!
//! Sessions are stored JSON-serialized in a single-row-per-call table with
//! a per-key TTL that is refreshed on every write. Read-modify-write
//! operations take a per-key async lock: one call is effectively
//! single-writer, but background tasks may still read or write after the
//! main handler has moved on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use scylla::{Session, SessionBuilder};
use tokio::sync::Mutex as AsyncMutex;

use intake_agent_core::{CallSession, IntakePhase, Speaker};

use crate::{checked_transition, SessionUpdate, StateError, StateStore};

/// Replicated store configuration
#[derive(Debug, Clone)]
pub struct ScyllaStoreConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub ttl_seconds: u32,
    pub replication_factor: u8,
}

/// Per-key async locks for read-modify-write serialization
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    fn for_key(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn remove(&self, key: &str) {
        self.locks.lock().remove(key);
    }
}

pub struct ScyllaStateStore {
    session: Arc<Session>,
    config: ScyllaStoreConfig,
    locks: KeyLocks,
}

impl ScyllaStateStore {
    /// Connect to the cluster and ensure the keyspace and table exist
    pub async fn connect(config: ScyllaStoreConfig) -> Result<Self, StateError> {
        tracing::info!(hosts = ?config.hosts, keyspace = %config.keyspace, "Connecting to ScyllaDB");

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .build()
            .await?;

        let store = Self {
            session: Arc::new(session),
            config,
            locks: KeyLocks::default(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StateError> {
        let keyspace = format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            self.config.keyspace, self.config.replication_factor
        );
        self.session.query_unpaged(keyspace, &[]).await?;

        let table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {}.call_sessions (
                call_id TEXT,
                phase TEXT,
                session_json TEXT,
                updated_at TIMESTAMP,
                PRIMARY KEY (call_id)
            ) WITH default_time_to_live = {}
            "#,
            self.config.keyspace, self.config.ttl_seconds
        );
        self.session.query_unpaged(table, &[]).await?;

        tracing::info!(keyspace = %self.config.keyspace, "State store schema ensured");
        Ok(())
    }

    /// Write the full row, refreshing the TTL
    async fn put(&self, session: &CallSession) -> Result<(), StateError> {
        let json = serde_json::to_string(session)?;
        let query = format!(
            "INSERT INTO {}.call_sessions (call_id, phase, session_json, updated_at) \
             VALUES (?, ?, ?, ?) USING TTL ?",
            self.config.keyspace
        );
        self.session
            .query_unpaged(
                query,
                (
                    &session.call_id,
                    session.phase.as_str(),
                    json,
                    Utc::now().timestamp_millis(),
                    self.config.ttl_seconds as i32,
                ),
            )
            .await?;
        Ok(())
    }

    async fn fetch(&self, call_id: &str) -> Result<Option<CallSession>, StateError> {
        let query = format!(
            "SELECT session_json FROM {}.call_sessions WHERE call_id = ?",
            self.config.keyspace
        );
        let result = self.session.query_unpaged(query, (call_id,)).await?;

        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let (json,): (String,) = row
                    .into_typed()
                    .map_err(|e| StateError::Backend(e.to_string()))?;
                return Ok(Some(serde_json::from_str(&json)?));
            }
        }
        Ok(None)
    }

    /// Read-modify-write under the per-key lock
    async fn mutate<F>(&self, call_id: &str, mutate: F) -> Option<CallSession>
    where
        F: FnOnce(&mut CallSession),
    {
        let lock = self.locks.for_key(call_id);
        let _guard = lock.lock().await;

        let mut session = match self.fetch(call_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(call_id = %call_id, error = %err, "State fetch failed");
                return None;
            }
        };

        mutate(&mut session);

        if let Err(err) = self.put(&session).await {
            tracing::error!(call_id = %call_id, error = %err, "State write failed");
            return None;
        }
        Some(session)
    }
}

#[async_trait]
impl StateStore for ScyllaStateStore {
    async fn create(&self, call_id: &str) -> Result<CallSession, StateError> {
        let lock = self.locks.for_key(call_id);
        let _guard = lock.lock().await;

        if let Ok(Some(_)) = self.fetch(call_id).await {
            tracing::warn!(call_id = %call_id, "Overwriting existing session on create");
        }
        let session = CallSession::new(call_id);
        self.put(&session).await?;
        tracing::info!(call_id = %call_id, ttl_seconds = self.config.ttl_seconds, "Created conversation state");
        Ok(session)
    }

    async fn get(&self, call_id: &str) -> Option<CallSession> {
        match self.fetch(call_id).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(call_id = %call_id, error = %err, "State fetch failed");
                None
            }
        }
    }

    async fn update(&self, call_id: &str, update: SessionUpdate) -> Option<CallSession> {
        self.mutate(call_id, |session| update.apply(session)).await
    }

    async fn transition_phase(&self, call_id: &str, phase: IntakePhase) -> Option<CallSession> {
        self.mutate(call_id, |session| {
            if let Some(next) = checked_transition(call_id, session.phase, phase) {
                session.phase = next;
            }
        })
        .await
    }

    async fn append_transcript(
        &self,
        call_id: &str,
        speaker: Speaker,
        text: &str,
    ) -> Option<CallSession> {
        self.mutate(call_id, |session| {
            session.add_transcript_entry(speaker, text);
        })
        .await
    }

    async fn delete(&self, call_id: &str) {
        let query = format!(
            "DELETE FROM {}.call_sessions WHERE call_id = ?",
            self.config.keyspace
        );
        if let Err(err) = self.session.query_unpaged(query, (call_id,)).await {
            tracing::error!(call_id = %call_id, error = %err, "State delete failed");
        } else {
            tracing::info!(call_id = %call_id, "Evicted conversation state");
        }
        self.locks.remove(call_id);
    }

    async fn healthy(&self) -> bool {
        let query = format!(
            "SELECT call_id FROM {}.call_sessions LIMIT 1",
            self.config.keyspace
        );
        self.session.query_unpaged(query, &[]).await.is_ok()
    }

    fn is_replicated(&self) -> bool {
        true
    }
}
