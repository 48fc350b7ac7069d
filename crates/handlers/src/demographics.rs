//! Demographics and contact-info handler
//!
//! Shared across the DEMOGRAPHICS and CONTACT_INFO phases: one instance
//! keeps its step cursor while the phase advances underneath it. Address
//! validation is best-effort; when the validator rejects or is unreachable
//! the address is accepted unvalidated as long as it plausibly looks like
//! one. Email collection is policy-gated and skipped entirely outside
//! production deployments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use intake_agent_core::{Address, AddressValidator, CallSession, IntakePhase, Result};
use intake_agent_extract::{address_components, digits, email as extract_email, phone_number};
use intake_agent_state::{SessionUpdate, StateStore};

use crate::PhaseHandler;

const STREET_KEYWORDS: &[&str] = &[
    "street", "st", "avenue", "ave", "road", "rd", "drive", "dr", "lane", "ln", "boulevard",
    "blvd", "way", "court", "ct", "place", "pl", "parkway", "pkwy",
];

const NON_ADDRESS_REPLIES: &[&str] = &["yes", "no", "ok", "okay", "sure"];

const FIND_DOCTORS_RESPONSE: &str =
    "Thank you! Now let me find available doctors for you based on your needs.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    FullAddress,
    Phone,
    Email,
}

/// Email-collection policy for this deployment
#[derive(Debug, Clone)]
pub struct ContactPolicy {
    pub collect_email: bool,
    /// Auto-filled when collection is skipped
    pub test_email: String,
}

pub struct DemographicsHandler {
    call_id: String,
    store: Arc<dyn StateStore>,
    validator: Arc<dyn AddressValidator>,
    validator_timeout: Duration,
    policy: ContactPolicy,
    step: Mutex<Step>,
}

impl DemographicsHandler {
    pub fn new(
        call_id: impl Into<String>,
        store: Arc<dyn StateStore>,
        validator: Arc<dyn AddressValidator>,
        validator_timeout: Duration,
        policy: ContactPolicy,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            store,
            validator,
            validator_timeout,
            policy,
            step: Mutex::new(Step::FullAddress),
        }
    }

    async fn handle_full_address(&self, input: &str) -> Result<Option<String>> {
        let parts = address_components(input);

        // Attempt validation but never block on its failure
        let validated = match tokio::time::timeout(
            self.validator_timeout,
            self.validator
                .validate(&parts.street, &parts.city, &parts.state, &parts.zip),
        )
        .await
        {
            Ok(Ok(address)) => Some(address),
            Ok(Err(err)) => {
                tracing::warn!(call_id = %self.call_id, error = %err, "Address validation failed");
                None
            }
            Err(_) => {
                tracing::warn!(call_id = %self.call_id, "Address validation timed out");
                None
            }
        };

        if let Some(address) = validated.filter(|a| a.validated) {
            self.accept_address(address).await;
            return Ok(Some(
                "Great! I've verified your address. Now, what's the best phone number \
                 to reach you at?"
                    .to_string(),
            ));
        }

        // Permissive fallback: plausible addresses pass unvalidated
        let lowered = input.to_lowercase();
        let trimmed = lowered.trim();
        if NON_ADDRESS_REPLIES.contains(&trimmed) {
            self.note_ambiguous().await;
            return Ok(Some(
                "I need your complete street address, starting with the house number and \
                 street name. For example: '150 Van Ness Ave, San Francisco, CA 94102'."
                    .to_string(),
            ));
        }

        let has_digits = input.chars().any(|c| c.is_ascii_digit());
        let padded = format!(" {trimmed} ");
        let has_street_keyword = STREET_KEYWORDS
            .iter()
            .any(|kw| padded.contains(&format!(" {kw} ")) || padded.contains(&format!(" {kw}, ")));
        let wordy = input.split_whitespace().count() >= 4;

        if has_digits && (has_street_keyword || wordy) {
            let street = if parts.street.is_empty() {
                input.trim().to_string()
            } else {
                parts.street
            };
            self.accept_address(Address {
                street,
                city: parts.city,
                state: parts.state,
                zip_code: parts.zip,
                validated: false,
                validation_message: Some("captured without verification".to_string()),
            })
            .await;
            return Ok(Some(
                "Thanks! What's the best phone number to reach you at?".to_string(),
            ));
        }

        self.note_ambiguous().await;
        Ok(Some(
            "I need your complete street address for our records. Please provide your \
             house number and street name, like '150 Van Ness Ave, San Francisco, CA 94102'."
                .to_string(),
        ))
    }

    async fn accept_address(&self, address: Address) {
        self.store
            .update(&self.call_id, SessionUpdate::new().address(address))
            .await;
        self.store
            .transition_phase(&self.call_id, IntakePhase::ContactInfo)
            .await;
        *self.step.lock() = Step::Phone;
    }

    async fn handle_phone(&self, input: &str) -> Result<Option<String>> {
        let all_digits = digits(input);

        let formatted = if let Some(phone) = phone_number(input) {
            phone
        } else if all_digits.len() >= 10 {
            let d = &all_digits[..10];
            format!("({}) {}-{}", &d[0..3], &d[3..6], &d[6..10])
        } else if all_digits.len() >= 7 {
            all_digits
        } else {
            self.note_ambiguous().await;
            return Ok(Some(
                "I didn't catch a phone number. Please say the digits clearly, for example \
                 '765 771 0488'. What's the best phone number to reach you at?"
                    .to_string(),
            ));
        };

        self.store
            .update(&self.call_id, SessionUpdate::new().phone_number(formatted))
            .await;

        if !self.policy.collect_email {
            // Skip email collection entirely and advance
            self.store
                .update(
                    &self.call_id,
                    SessionUpdate::new().email(self.policy.test_email.clone()),
                )
                .await;
            self.store
                .transition_phase(&self.call_id, IntakePhase::ProviderSelection)
                .await;
            return Ok(Some(FIND_DOCTORS_RESPONSE.to_string()));
        }

        *self.step.lock() = Step::Email;
        Ok(Some(
            "Perfect! And may I have your email address for appointment confirmations?"
                .to_string(),
        ))
    }

    async fn handle_email(&self, input: &str) -> Result<Option<String>> {
        if let Some(email) = extract_email(input) {
            self.store
                .update(&self.call_id, SessionUpdate::new().email(email))
                .await;
        } else {
            tracing::info!(call_id = %self.call_id, "No email captured; proceeding without one");
        }

        self.store
            .transition_phase(&self.call_id, IntakePhase::ProviderSelection)
            .await;
        Ok(Some(FIND_DOCTORS_RESPONSE.to_string()))
    }

    async fn note_ambiguous(&self) {
        self.store
            .update(&self.call_id, SessionUpdate::new().increment_error_count())
            .await;
    }
}

#[async_trait]
impl PhaseHandler for DemographicsHandler {
    async fn process_input(&self, input: &str, _session: &CallSession) -> Result<Option<String>> {
        let step = *self.step.lock();
        match step {
            Step::FullAddress => self.handle_full_address(input).await,
            Step::Phone => self.handle_phone(input).await,
            Step::Email => self.handle_email(input).await,
        }
    }

    fn name(&self) -> &'static str {
        "demographics"
    }
}
