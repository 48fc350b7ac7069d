//! Provider selection and appointment scheduling handler
//!
//! Shared across PROVIDER_SELECTION and APPOINTMENT_SCHEDULING so the
//! provider and slot lists fetched for the first turn survive into the
//! next. Selection never blocks: numeric index, then name/keyword match,
//! then the optional LLM classifier vote, then default to the first
//! option. Missing upstream data is synthesized (a default provider, a
//! tomorrow-2-PM slot) rather than surfaced.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use intake_agent_core::{
    AppointmentSlot, CallSession, ChoiceClassifier, IntakePhase, Provider, ProviderDirectory,
    Result,
};
use intake_agent_extract::{number_word, resolve_slot_phrase};
use intake_agent_state::{SessionUpdate, StateStore};

use crate::PhaseHandler;

/// At most this many options are spoken per menu
const MAX_SPOKEN_OPTIONS: usize = 3;

/// Read the utterance as an explicit menu choice.
///
/// Bare digits always count; number words only when the utterance is short
/// enough to be a choice and nothing else, so "tomorrow at 2" is left for
/// the day/time resolver instead of being misread as option two.
fn explicit_choice(input: &str) -> Option<u32> {
    let trimmed = input.trim().trim_end_matches(['.', '!', '?']);
    if let Ok(n) = trimmed.parse::<u32>() {
        return Some(n);
    }
    if trimmed.split_whitespace().count() <= 2 {
        return number_word(trimmed);
    }
    None
}

pub struct SchedulingHandler {
    call_id: String,
    store: Arc<dyn StateStore>,
    directory: Arc<dyn ProviderDirectory>,
    classifier: Option<Arc<dyn ChoiceClassifier>>,
    lookup_timeout: Duration,
    providers: Mutex<Vec<Provider>>,
    slots: Mutex<Vec<AppointmentSlot>>,
}

impl SchedulingHandler {
    pub fn new(
        call_id: impl Into<String>,
        store: Arc<dyn StateStore>,
        directory: Arc<dyn ProviderDirectory>,
        classifier: Option<Arc<dyn ChoiceClassifier>>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            store,
            directory,
            classifier,
            lookup_timeout,
            providers: Mutex::new(Vec::new()),
            slots: Mutex::new(Vec::new()),
        }
    }

    fn default_provider() -> Provider {
        Provider {
            id: "default-1".to_string(),
            name: "Sarah Smith".to_string(),
            specialty: "Primary Care".to_string(),
            accepted_payers: Vec::new(),
            rating: 4.5,
        }
    }

    /// Fallback slot when the lookup returns nothing: tomorrow 2 PM
    fn default_slot(now: DateTime<Utc>) -> AppointmentSlot {
        let tomorrow = now + ChronoDuration::days(1);
        let starts_at = tomorrow
            .date_naive()
            .and_hms_opt(14, 0, 0)
            .map(|n| DateTime::<Utc>::from_naive_utc_and_offset(n, Utc))
            .unwrap_or(tomorrow);
        let weekday = starts_at.format("%A").to_string().to_lowercase();
        AppointmentSlot {
            starts_at,
            display: format!("{} at 2:00 PM", starts_at.format("%A, %B %-d")),
            keywords: vec!["2 pm".to_string(), "tomorrow".to_string(), weekday],
        }
    }

    async fn fetch_providers(&self, session: &CallSession) -> Vec<Provider> {
        let complaint = session.patient_info.chief_complaint.clone();
        let payer = session
            .patient_info
            .insurance
            .as_ref()
            .map(|i| i.payer_name.clone());

        let fetched = tokio::time::timeout(
            self.lookup_timeout,
            self.directory
                .list_providers(complaint.as_deref(), payer.as_deref()),
        )
        .await;

        match fetched {
            Ok(Ok(providers)) if !providers.is_empty() => providers,
            Ok(Ok(_)) => {
                tracing::info!(call_id = %self.call_id, "No providers returned; using default");
                vec![Self::default_provider()]
            }
            Ok(Err(err)) => {
                tracing::warn!(call_id = %self.call_id, error = %err, "Provider lookup failed; using default");
                vec![Self::default_provider()]
            }
            Err(_) => {
                tracing::warn!(call_id = %self.call_id, "Provider lookup timed out; using default");
                vec![Self::default_provider()]
            }
        }
    }

    async fn fetch_slots(&self, provider_id: &str) -> Vec<AppointmentSlot> {
        let fetched = tokio::time::timeout(
            self.lookup_timeout,
            self.directory.list_slots(provider_id),
        )
        .await;

        let slots = match fetched {
            Ok(Ok(slots)) => slots,
            Ok(Err(err)) => {
                tracing::warn!(call_id = %self.call_id, error = %err, "Slot lookup failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(call_id = %self.call_id, "Slot lookup timed out");
                Vec::new()
            }
        };

        if slots.is_empty() {
            vec![Self::default_slot(Utc::now())]
        } else {
            slots
        }
    }

    async fn classify_index(&self, input: &str, labels: &[String]) -> Option<usize> {
        let classifier = self.classifier.as_ref()?;
        let result = tokio::time::timeout(
            self.lookup_timeout,
            classifier.classify(input, labels),
        )
        .await;

        match result {
            Ok(Ok(Some(classification))) => {
                labels.iter().position(|l| *l == classification.label)
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                tracing::debug!(call_id = %self.call_id, error = %err, "Classifier vote skipped");
                None
            }
            Err(_) => {
                tracing::debug!(call_id = %self.call_id, "Classifier vote timed out");
                None
            }
        }
    }

    async fn handle_provider_selection(
        &self,
        input: &str,
        session: &CallSession,
    ) -> Result<Option<String>> {
        // First turn in this phase: fetch, present, and pre-fetch the first
        // candidate's slots so the next turn has no pause
        if self.providers.lock().is_empty() {
            let providers = self.fetch_providers(session).await;

            let options: Vec<String> = providers
                .iter()
                .take(MAX_SPOKEN_OPTIONS)
                .enumerate()
                .map(|(i, p)| format!("{}. {} - {}", i + 1, p.display_name(), p.specialty))
                .collect();

            let first_id = providers[0].id.clone();
            *self.providers.lock() = providers;
            let prefetched = self.fetch_slots(&first_id).await;
            *self.slots.lock() = prefetched;

            return Ok(Some(format!(
                "Based on your needs, I have these doctors available: {}. \
                 Which doctor would you like?",
                options.join(", ")
            )));
        }

        let providers = self.providers.lock().clone();
        let presented = providers.len().min(MAX_SPOKEN_OPTIONS);
        let mut selected: Option<usize> = None;

        // 1) Explicit numeric choice ("3", "number two")
        if let Some(n) = explicit_choice(input) {
            let idx = (n as usize).wrapping_sub(1);
            if idx < presented {
                selected = Some(idx);
            }
        }

        // 2) Name substring
        if selected.is_none() {
            let lowered = input.to_lowercase();
            selected = providers
                .iter()
                .position(|p| lowered.contains(&p.name.to_lowercase()));
        }

        // 3) Classifier vote over the spoken labels
        if selected.is_none() {
            let labels: Vec<String> = providers
                .iter()
                .take(presented)
                .map(|p| format!("{} - {}", p.display_name(), p.specialty))
                .collect();
            selected = self.classify_index(input, &labels).await;
        }

        // 4) Never block: default to the first option
        let idx = selected.unwrap_or(0);
        let provider = providers[idx.min(providers.len() - 1)].clone();

        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().selected_provider(provider.display_name()),
            )
            .await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::AppointmentScheduling)
            .await;

        // Use the pre-fetched slots when the caller picked option one;
        // otherwise fetch for the chosen provider
        let slots = if idx == 0 && !self.slots.lock().is_empty() {
            self.slots.lock().clone()
        } else {
            let fetched = self.fetch_slots(&provider.id).await;
            *self.slots.lock() = fetched.clone();
            fetched
        };

        let slot_options: Vec<String> = slots
            .iter()
            .take(MAX_SPOKEN_OPTIONS)
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.display))
            .collect();

        Ok(Some(format!(
            "{} has these appointments available: {}. Which time works best for you?",
            provider.display_name(),
            slot_options.join(", ")
        )))
    }

    async fn handle_slot_selection(
        &self,
        input: &str,
        session: &CallSession,
    ) -> Result<Option<String>> {
        {
            let mut slots = self.slots.lock();
            if slots.is_empty() {
                slots.push(Self::default_slot(Utc::now()));
            }
        }
        let slots = self.slots.lock().clone();
        let presented = slots.len().min(MAX_SPOKEN_OPTIONS);
        let mut selected: Option<usize> = None;

        // 1) Numeric or number-word index
        if let Some(n) = explicit_choice(input) {
            let idx = (n as usize).wrapping_sub(1);
            if idx < presented {
                selected = Some(idx);
            }
        }

        // 2) Explicit day/time phrase resolved to the nearest candidate
        if selected.is_none() {
            selected = resolve_slot_phrase(input, &slots, Utc::now());
        }

        // 3) Slot keyword tags
        if selected.is_none() {
            let lowered = input.to_lowercase();
            selected = slots
                .iter()
                .position(|s| s.keywords.iter().any(|k| lowered.contains(k.as_str())));
        }

        // 4) Classifier vote over the display labels
        if selected.is_none() {
            let labels: Vec<String> = slots
                .iter()
                .take(presented)
                .map(|s| s.display.clone())
                .collect();
            selected = self.classify_index(input, &labels).await;
        }

        // 5) Never block: first slot
        let slot = slots[selected.unwrap_or(0).min(slots.len() - 1)].clone();

        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().appointment_datetime(slot.starts_at),
            )
            .await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::Confirmation)
            .await;

        let provider = session
            .patient_info
            .selected_provider
            .clone()
            .unwrap_or_else(|| "your doctor".to_string());

        Ok(Some(format!(
            "Perfect! I've scheduled your appointment with {provider} for {}. \
             You'll receive a confirmation email shortly. Goodbye!",
            slot.display
        )))
    }
}

#[async_trait]
impl PhaseHandler for SchedulingHandler {
    async fn process_input(&self, input: &str, session: &CallSession) -> Result<Option<String>> {
        match session.phase {
            IntakePhase::ProviderSelection => self.handle_provider_selection(input, session).await,
            _ => self.handle_slot_selection(input, session).await,
        }
    }

    fn name(&self) -> &'static str {
        "scheduling"
    }
}
