//! External collaborator contracts
//!
//! Address validation, provider/slot lookup, choice classification, and
//! confirmation dispatch. All of these can be slow or down; callers wrap
//! them in timeouts and fall back to permissive defaults rather than
//! stalling a live call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Address, CallSession};

/// Address validation service
///
/// Implementations must not panic or hang on an unreachable backend:
/// return [`Error::Unavailable`](crate::Error::Unavailable) (which handlers
/// catch) or a best-effort unvalidated [`Address`].
#[async_trait]
pub trait AddressValidator: Send + Sync {
    async fn validate(&self, street: &str, city: &str, state: &str, zip: &str)
        -> Result<Address>;
}

/// A bookable provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    /// Bare name without honorific ("Sarah Smith")
    pub name: String,
    pub specialty: String,
    /// Payer names this provider accepts; empty means all
    #[serde(default)]
    pub accepted_payers: Vec<String>,
    pub rating: f32,
}

impl Provider {
    /// Display label as spoken to the caller
    pub fn display_name(&self) -> String {
        format!("Dr. {}", self.name)
    }
}

/// One open appointment slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub starts_at: DateTime<Utc>,
    /// Human phrasing ("tomorrow at 2:00 PM")
    pub display: String,
    /// Lowercase keywords the caller might use to pick this slot
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Provider and slot lookup, ranked by fit for the complaint and coverage
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn list_providers(
        &self,
        chief_complaint: Option<&str>,
        payer_name: Option<&str>,
    ) -> Result<Vec<Provider>>;

    async fn list_slots(&self, provider_id: &str) -> Result<Vec<AppointmentSlot>>;
}

/// Result of a classification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

/// Optional LLM fallback for resolving ambiguous menu choices
#[async_trait]
pub trait ChoiceClassifier: Send + Sync {
    /// Pick the best matching label, or `None` when nothing fits
    async fn classify(&self, utterance: &str, labels: &[String])
        -> Result<Option<Classification>>;
}

/// Appointment-confirmation dispatch (email or similar)
///
/// Used fire-and-forget with retry from a supervised background task.
#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    /// Returns whether the confirmation was accepted for delivery
    async fn send_confirmation(&self, session: &CallSession) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display_name() {
        let provider = Provider {
            id: "dr_smith_001".into(),
            name: "Sarah Smith".into(),
            specialty: "Family Medicine".into(),
            accepted_payers: vec![],
            rating: 4.8,
        };
        assert_eq!(provider.display_name(), "Dr. Sarah Smith");
    }
}
