//! Conversation state store
//!
//! Keyed by call identifier, holds the mutable intake record and current
//! phase. Two interchangeable backends: a volatile in-process map and a
//! replicated ScyllaDB table with per-key TTL. All mutation goes through
//! the store's atomic operations; callers never mutate a fetched snapshot
//! and assume it persisted.

mod memory;
mod scylla_store;
mod update;

pub use memory::InMemoryStateStore;
pub use scylla_store::{ScyllaStateStore, ScyllaStoreConfig};
pub use update::SessionUpdate;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use intake_agent_config::{StateBackend, StateStoreConfig};
use intake_agent_core::{CallSession, IntakePhase, Speaker};

/// State store failures
#[derive(Debug, Error)]
pub enum StateError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<scylla::transport::errors::QueryError> for StateError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        StateError::Backend(err.to_string())
    }
}

impl From<scylla::transport::errors::NewSessionError> for StateError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        StateError::Backend(err.to_string())
    }
}

/// Store contract shared by both backends.
///
/// `update` and `transition_phase` are read-modify-write operations that
/// serialize per key; concurrent calls touching different keys never block
/// each other. Lookup operations return `None` for unknown call ids.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Create a fresh session. An existing session under the same key is
    /// overwritten with a warning (the transport occasionally reconnects
    /// with the same call id).
    async fn create(&self, call_id: &str) -> Result<CallSession, StateError>;

    async fn get(&self, call_id: &str) -> Option<CallSession>;

    /// Merge the partial update into the session; no-op for unknown ids
    async fn update(&self, call_id: &str, update: SessionUpdate) -> Option<CallSession>;

    /// Move the session to a new phase.
    ///
    /// Backward transitions violate phase monotonicity and are refused
    /// (logged, session returned unchanged), as are transitions out of a
    /// terminal phase.
    async fn transition_phase(&self, call_id: &str, phase: IntakePhase) -> Option<CallSession>;

    /// Append one transcript entry
    async fn append_transcript(
        &self,
        call_id: &str,
        speaker: Speaker,
        text: &str,
    ) -> Option<CallSession>;

    /// Evict the session
    async fn delete(&self, call_id: &str);

    /// Backend reachability, used by the readiness probe
    async fn healthy(&self) -> bool {
        true
    }

    fn is_replicated(&self) -> bool {
        false
    }
}

/// Apply monotonicity rules to a requested transition. Returns the phase to
/// store, or `None` when the request must be refused.
pub(crate) fn checked_transition(
    call_id: &str,
    current: IntakePhase,
    requested: IntakePhase,
) -> Option<IntakePhase> {
    if current.is_terminal() {
        tracing::warn!(
            call_id = %call_id,
            current = %current,
            requested = %requested,
            "Ignoring transition out of terminal phase"
        );
        return None;
    }
    if !current.can_advance_to(requested) {
        tracing::warn!(
            call_id = %call_id,
            current = %current,
            requested = %requested,
            "Refusing backward phase transition"
        );
        return None;
    }
    if current != requested {
        tracing::info!(call_id = %call_id, from = %current, to = %requested, "Phase transition");
    }
    Some(requested)
}

/// Build the configured store, degrading gracefully: when the replicated
/// backend is selected but unreachable at startup, fall back to the
/// volatile backend with a warning rather than failing call setup.
pub async fn create_state_store(config: &StateStoreConfig) -> Arc<dyn StateStore> {
    match config.backend {
        StateBackend::Memory => Arc::new(InMemoryStateStore::new()),
        StateBackend::Scylla => {
            let scylla_config = ScyllaStoreConfig {
                hosts: config.scylla_hosts.clone(),
                keyspace: config.keyspace.clone(),
                ttl_seconds: config.ttl_seconds,
                replication_factor: config.replication_factor,
            };
            match ScyllaStateStore::connect(scylla_config).await {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Replicated state store unreachable; falling back to in-memory backend"
                    );
                    Arc::new(InMemoryStateStore::new())
                }
            }
        }
    }
}
