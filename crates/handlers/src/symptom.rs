//! Chief complaint and symptom handler
//!
//! Collects the complaint (any non-empty utterance), then duration and an
//! optional 1-10 pain rating in one follow-up turn. Emergency keywords get
//! an advisory but never halt the flow; triage is not this system's job.

use std::sync::Arc;

use async_trait::async_trait;

use intake_agent_core::{CallSession, IntakePhase, Result};
use intake_agent_extract::pain_scale;
use intake_agent_state::{SessionUpdate, StateStore};

use crate::PhaseHandler;

const EMERGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "chest pain",
    "can't breathe",
    "cannot breathe",
    "bleeding",
    "unconscious",
];

/// Marker appended once the duration follow-up has been captured
const DURATION_MARKER: &str = "(Duration:";

pub struct SymptomHandler {
    call_id: String,
    store: Arc<dyn StateStore>,
}

impl SymptomHandler {
    pub fn new(call_id: impl Into<String>, store: Arc<dyn StateStore>) -> Self {
        Self {
            call_id: call_id.into(),
            store,
        }
    }

    async fn handle_initial_complaint(&self, input: &str) -> Result<Option<String>> {
        let complaint = input.trim().to_string();
        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().chief_complaint(complaint.clone()),
            )
            .await;

        let lowered = complaint.to_lowercase();
        if EMERGENCY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            tracing::warn!(call_id = %self.call_id, "Emergency keywords in chief complaint");
            return Ok(Some(
                "This sounds like it may need immediate attention. If this is an emergency, \
                 please hang up and dial 911. Otherwise, how long have you been experiencing \
                 these symptoms?"
                    .to_string(),
            ));
        }

        Ok(Some(
            "I understand. How long have you been experiencing these symptoms? \
             And on a scale of 1 to 10, how would you rate your discomfort?"
                .to_string(),
        ))
    }

    async fn handle_symptom_details(
        &self,
        input: &str,
        session: &CallSession,
    ) -> Result<Option<String>> {
        let mut update = SessionUpdate::new();

        // Pain rating is optional; proceed silently without one
        if let Some(level) = pain_scale(input) {
            update = update.urgency_level(level);
        }

        let complaint = session
            .patient_info
            .chief_complaint
            .clone()
            .unwrap_or_default();
        update = update.chief_complaint(format!("{complaint} {DURATION_MARKER} {})", input.trim()));

        self.store.update(&self.call_id, update).await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::Demographics)
            .await;

        Ok(Some(
            "Thank you for that information. Now I need to verify your address. \
             Could you please provide your complete street address including city, \
             state, and zip code?"
                .to_string(),
        ))
    }
}

#[async_trait]
impl PhaseHandler for SymptomHandler {
    async fn process_input(&self, input: &str, session: &CallSession) -> Result<Option<String>> {
        match session.patient_info.chief_complaint.as_deref() {
            None => self.handle_initial_complaint(input).await,
            Some(complaint) if !complaint.contains(DURATION_MARKER) => {
                self.handle_symptom_details(input, session).await
            }
            // Details already captured on a previous turn; make sure the
            // phase moved and re-issue the address prompt
            Some(_) => {
                self.store
                    .transition_phase(&self.call_id, IntakePhase::Demographics)
                    .await;
                Ok(Some(
                    "Thank you for that information. Now I need to collect your address for \
                     our records. Could you please provide your complete street address?"
                        .to_string(),
                ))
            }
        }
    }

    fn name(&self) -> &'static str {
        "symptom"
    }
}
