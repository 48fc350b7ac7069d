//! Volatile in-process state store
//!
//! A mutex-guarded map. Fast and simple; state is lost on restart and
//! cannot be shared across instances. Use the replicated backend for
//! deployments that need either.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use intake_agent_core::{CallSession, IntakePhase, Speaker};

use crate::{checked_transition, SessionUpdate, StateError, StateStore};

#[derive(Default)]
pub struct InMemoryStateStore {
    sessions: RwLock<HashMap<String, CallSession>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn create(&self, call_id: &str) -> Result<CallSession, StateError> {
        let session = CallSession::new(call_id);
        let mut sessions = self.sessions.write();
        if sessions.contains_key(call_id) {
            tracing::warn!(call_id = %call_id, "Overwriting existing session on create");
        }
        sessions.insert(call_id.to_string(), session.clone());
        tracing::info!(call_id = %call_id, "Created conversation state");
        Ok(session)
    }

    async fn get(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.read().get(call_id).cloned()
    }

    async fn update(&self, call_id: &str, update: SessionUpdate) -> Option<CallSession> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(call_id)?;
        update.apply(session);
        Some(session.clone())
    }

    async fn transition_phase(&self, call_id: &str, phase: IntakePhase) -> Option<CallSession> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(call_id)?;
        if let Some(next) = checked_transition(call_id, session.phase, phase) {
            session.phase = next;
        }
        Some(session.clone())
    }

    async fn append_transcript(
        &self,
        call_id: &str,
        speaker: Speaker,
        text: &str,
    ) -> Option<CallSession> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(call_id)?;
        session.add_transcript_entry(speaker, text);
        Some(session.clone())
    }

    async fn delete(&self, call_id: &str) {
        if self.sessions.write().remove(call_id).is_some() {
            tracing::info!(call_id = %call_id, "Evicted conversation state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_agent_core::Insurance;

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = InMemoryStateStore::new();
        store.create("CA1").await.unwrap();

        let session = store.get("CA1").await.unwrap();
        assert_eq!(session.phase, IntakePhase::Greeting);

        store.delete("CA1").await;
        assert!(store.get("CA1").await.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_noop() {
        let store = InMemoryStateStore::new();
        let result = store
            .update("missing", SessionUpdate::new().phone_number("555"))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_phase_never_regresses() {
        let store = InMemoryStateStore::new();
        store.create("CA1").await.unwrap();

        store.transition_phase("CA1", IntakePhase::Insurance).await;
        store
            .transition_phase("CA1", IntakePhase::ChiefComplaint)
            .await;
        let session = store
            .transition_phase("CA1", IntakePhase::Insurance)
            .await
            .unwrap();
        assert_eq!(session.phase, IntakePhase::ChiefComplaint);
    }

    #[tokio::test]
    async fn test_terminal_phase_is_sticky() {
        let store = InMemoryStateStore::new();
        store.create("CA1").await.unwrap();
        store.transition_phase("CA1", IntakePhase::Completed).await;
        let session = store
            .transition_phase("CA1", IntakePhase::Confirmation)
            .await
            .unwrap();
        assert_eq!(session.phase, IntakePhase::Completed);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemoryStateStore::new();
        store.create("CA1").await.unwrap();
        store.create("CA2").await.unwrap();

        store
            .update(
                "CA1",
                SessionUpdate::new().insurance(Insurance::new("Aetna", "A123456")),
            )
            .await;

        let other = store.get("CA2").await.unwrap();
        assert!(other.patient_info.insurance.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_calls_do_not_interfere() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStateStore::new());
        store.create("CA1").await.unwrap();
        store.create("CA2").await.unwrap();

        let mut handles = Vec::new();
        for (id, phone) in [("CA1", "(111) 111-1111"), ("CA2", "(222) 222-2222")] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    store
                        .update(id, SessionUpdate::new().phone_number(phone))
                        .await;
                    store.append_transcript(id, Speaker::User, "hello").await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let one = store.get("CA1").await.unwrap();
        let two = store.get("CA2").await.unwrap();
        assert_eq!(one.patient_info.phone_number.as_deref(), Some("(111) 111-1111"));
        assert_eq!(two.patient_info.phone_number.as_deref(), Some("(222) 222-2222"));
        assert_eq!(one.transcript.len(), 50);
        assert_eq!(two.transcript.len(), 50);
    }
}
