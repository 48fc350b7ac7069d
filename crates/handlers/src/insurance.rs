//! Insurance collection handler
//!
//! Two internal steps (payer name, then member ID) plus an opportunistic
//! fast path that pulls both out of a single sentence. Recognition is
//! deliberately lenient: after two failed attempts at a step the handler
//! accepts almost anything non-trivial so the call always moves forward.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use intake_agent_core::{CallSession, Insurance, IntakePhase, Result};
use intake_agent_state::{SessionUpdate, StateStore};

use crate::PhaseHandler;

/// Recognized payer aliases, matched by substring
const PAYER_ALIASES: &[(&str, &str)] = &[
    ("aetna", "Aetna"),
    ("blue cross", "Blue Cross Blue Shield"),
    ("bcbs", "Blue Cross Blue Shield"),
    ("blue shield", "Blue Cross Blue Shield"),
    ("cigna", "Cigna"),
    ("humana", "Humana"),
    ("kaiser", "Kaiser Permanente"),
    ("united", "United Healthcare"),
    ("uhc", "United Healthcare"),
    ("anthem", "Anthem"),
    ("medicare", "Medicare"),
    ("medicaid", "Medicaid"),
    ("tricare", "Tricare"),
    ("wellpoint", "WellPoint"),
    ("centene", "Centene"),
    ("molina", "Molina Healthcare"),
    ("healthnet", "Health Net"),
    ("carefirst", "CareFirst"),
    ("highmark", "Highmark"),
    ("oxford", "Oxford Health"),
];

/// Meta-comments about the agent itself; never accepted as a payer name
const META_PHRASES: &[&str] = &[
    "you were supposed",
    "why did you",
    "stop speaking",
    "can you hear",
    "hello?",
    "are you there",
    "did you stop",
];

/// Conversational non-answers
const NON_ANSWERS: &[&str] = &["yes", "no", "ok", "okay", "sure", "what", "huh", "um", "uh"];

/// Filler stripped before judging whether the remainder could be a payer
const PAYER_FILLER: &[&str] = &["i have", "insurance", "provider", "it's", "its", "my", "is", "the"];

const MAX_STEP_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    PayerName,
    MemberId,
}

struct Cursor {
    step: Step,
    retries: u32,
}

pub struct InsuranceHandler {
    call_id: String,
    store: Arc<dyn StateStore>,
    cursor: Mutex<Cursor>,
}

impl InsuranceHandler {
    pub fn new(call_id: impl Into<String>, store: Arc<dyn StateStore>) -> Self {
        Self {
            call_id: call_id.into(),
            store,
            cursor: Mutex::new(Cursor {
                step: Step::PayerName,
                retries: 0,
            }),
        }
    }

    fn recognize_payer(input: &str) -> Option<&'static str> {
        let lowered = input.to_lowercase();
        PAYER_ALIASES
            .iter()
            .find(|(alias, _)| lowered.contains(alias))
            .map(|(_, name)| *name)
    }

    /// A member ID in free speech: an alphanumeric-with-hyphens token of at
    /// least five characters containing at least one digit. Last match wins
    /// since IDs usually trail the sentence.
    fn find_member_id_token(input: &str) -> Option<String> {
        input
            .to_uppercase()
            .split_whitespace()
            .filter(|token| {
                token.len() >= 5
                    && token
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-')
                    && token.chars().any(|c| c.is_ascii_digit())
            })
            .last()
            .map(|t| t.to_string())
    }

    /// Fast path: both payer and member ID in one utterance
    async fn try_parse_complete(&self, input: &str) -> Result<Option<String>> {
        let lowered = input.to_lowercase();
        let mentions_id = ["member id", "id is", "number is"]
            .iter()
            .any(|p| lowered.contains(p));
        let mentions_insurance = ["insurance", "have", "my"]
            .iter()
            .any(|p| lowered.contains(p));
        if !mentions_id || !mentions_insurance {
            return Ok(None);
        }

        let Some(payer) = Self::recognize_payer(input) else {
            return Ok(None);
        };
        let Some(member_id) = Self::find_member_id_token(input) else {
            return Ok(None);
        };

        tracing::info!(
            call_id = %self.call_id,
            payer = %payer,
            "Captured complete insurance from a single utterance"
        );
        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().insurance(Insurance::new(payer, member_id.clone())),
            )
            .await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::ChiefComplaint)
            .await;
        self.cursor.lock().retries = 0;

        Ok(Some(format!(
            "Perfect! I have your insurance information: {payer} with member ID {member_id}. \
             Now, what brings you in today? Please describe your main health concern."
        )))
    }

    async fn handle_payer_name(&self, input: &str, session: &CallSession) -> Result<Option<String>> {
        let retries = {
            let mut cursor = self.cursor.lock();
            cursor.retries += 1;
            cursor.retries
        };

        // Retries exhausted: accept the utterance as-is to keep moving
        if retries > MAX_STEP_RETRIES {
            let payer = input.trim().to_string();
            tracing::warn!(call_id = %self.call_id, payer = %payer, "Max retries reached, accepting payer as-is");
            return Ok(Some(self.store_payer(payer, session).await));
        }

        let lowered = input.to_lowercase();
        if META_PHRASES.iter().any(|p| lowered.contains(p)) {
            self.note_ambiguous().await;
            return Ok(Some(
                "I need your insurance provider name, like Kaiser, Blue Cross, Aetna, Cigna, \
                 or UnitedHealthcare. What insurance do you have?"
                    .to_string(),
            ));
        }

        if let Some(payer) = Self::recognize_payer(input) {
            return Ok(Some(self.store_payer(payer.to_string(), session).await));
        }

        // Unrecognized: accept anything that plausibly names a company
        let mut cleaned = lowered.clone();
        for word in PAYER_FILLER {
            cleaned = cleaned.replace(word, " ");
        }
        let cleaned = cleaned.trim().to_string();
        let plausible = cleaned.len() >= 3
            && !cleaned.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
            && !NON_ANSWERS.contains(&cleaned.as_str());

        if plausible {
            let payer = input.trim().to_string();
            tracing::warn!(call_id = %self.call_id, payer = %payer, "Accepting unrecognized payer for downstream review");
            return Ok(Some(self.store_payer(payer, session).await));
        }

        self.note_ambiguous().await;
        Ok(Some(
            "I need your insurance provider name. For example, you might say 'Kaiser' or \
             'Blue Cross' or the name on your insurance card. What insurance do you have?"
                .to_string(),
        ))
    }

    async fn store_payer(&self, payer: String, session: &CallSession) -> String {
        let member_id = session
            .patient_info
            .insurance
            .as_ref()
            .map(|i| i.member_id.clone())
            .unwrap_or_default();
        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().insurance(Insurance::new(payer.clone(), member_id)),
            )
            .await;

        let mut cursor = self.cursor.lock();
        cursor.step = Step::MemberId;
        cursor.retries = 0;
        drop(cursor);

        format!(
            "Thank you. I have {payer} as your insurance provider. \
             Now, could you please provide your member ID number?"
        )
    }

    async fn handle_member_id(&self, input: &str, session: &CallSession) -> Result<Option<String>> {
        let retries = {
            let mut cursor = self.cursor.lock();
            cursor.retries += 1;
            cursor.retries
        };
        let payer = session
            .patient_info
            .insurance
            .as_ref()
            .map(|i| i.payer_name.clone())
            .unwrap_or_default();

        // Retries exhausted: any alphanumeric run of four or more will do
        if retries > MAX_STEP_RETRIES {
            if let Some(id) = intake_agent_extract::loose_alphanumeric_run(input) {
                tracing::warn!(call_id = %self.call_id, member_id = %id, "Max retries reached, accepting loose member ID");
                return Ok(Some(self.store_member_id(payer, id, false).await));
            }
        }

        // Caller repeating the provider name instead of the ID
        if !payer.is_empty() && input.to_lowercase().contains(&payer.to_lowercase()) {
            return Ok(Some(
                "I already have your insurance provider. I need your member ID number - \
                 the unique number on your insurance card. Could you please provide that?"
                    .to_string(),
            ));
        }

        let extracted = intake_agent_extract::insurance_member_id(input)
            .or_else(|| intake_agent_extract::loose_alphanumeric_run(input));

        match extracted {
            Some(id) => Ok(Some(self.store_member_id(payer, id, true).await)),
            None => {
                self.note_ambiguous().await;
                Ok(Some(
                    "I need your member ID number from your insurance card. It's usually a \
                     combination of letters and numbers. Could you please say it slowly?"
                        .to_string(),
                ))
            }
        }
    }

    async fn store_member_id(&self, payer: String, member_id: String, echo_payer: bool) -> String {
        self.store
            .update(
                &self.call_id,
                SessionUpdate::new().insurance(Insurance::new(payer.clone(), member_id.clone())),
            )
            .await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::ChiefComplaint)
            .await;
        self.cursor.lock().retries = 0;

        if echo_payer && !payer.is_empty() {
            format!(
                "Perfect! I have your insurance information: {payer} with member ID {member_id}. \
                 Now, what brings you in today?"
            )
        } else {
            "Perfect! I have your insurance information. Now, what brings you in today? \
             Please describe your main health concern."
                .to_string()
        }
    }

    async fn note_ambiguous(&self) {
        self.store
            .update(&self.call_id, SessionUpdate::new().increment_error_count())
            .await;
    }
}

#[async_trait]
impl PhaseHandler for InsuranceHandler {
    async fn process_input(&self, input: &str, session: &CallSession) -> Result<Option<String>> {
        // Already complete (e.g. re-entered after a missed transition)
        if session.patient_info.insurance_complete() {
            self.store
                .transition_phase(&self.call_id, IntakePhase::ChiefComplaint)
                .await;
            return Ok(Some(
                "Thank you for the insurance information. Now, what's the main reason \
                 you'd like to see a doctor today?"
                    .to_string(),
            ));
        }

        if let Some(response) = self.try_parse_complete(input).await? {
            return Ok(Some(response));
        }

        let step = self.cursor.lock().step;
        match step {
            Step::PayerName => self.handle_payer_name(input, session).await,
            Step::MemberId => self.handle_member_id(input, session).await,
        }
    }

    fn name(&self) -> &'static str {
        "insurance"
    }
}
