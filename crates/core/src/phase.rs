//! Intake conversation phases
//!
//! The phase enum is the single active state of the per-call state machine.
//! Phases are strictly ordered; a call only ever moves forward (or stays in
//! place for same-phase retries).

use serde::{Deserialize, Serialize};

/// Phases of the appointment-intake conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntakePhase {
    /// Initial greeting, entered automatically at session creation
    #[default]
    Greeting,
    /// Legacy phase; the current flow bypasses it via the controller's
    /// pre-emptive transition to Insurance, but it remains reachable as a
    /// fallback route
    EmergencyCheck,
    /// Collecting payer name and member ID
    Insurance,
    /// Collecting the chief complaint, duration, and pain scale
    ChiefComplaint,
    /// Collecting and validating the street address
    Demographics,
    /// Collecting phone (and, in production, email)
    ContactInfo,
    /// Presenting and resolving the provider choice
    ProviderSelection,
    /// Presenting and resolving the time-slot choice
    AppointmentScheduling,
    /// Intake complete; confirmation dispatch in flight
    Confirmation,
    /// Terminal state; the transport should be closed
    Completed,
}

impl IntakePhase {
    /// Position in the forward ordering
    pub fn ordinal(&self) -> u8 {
        match self {
            IntakePhase::Greeting => 0,
            IntakePhase::EmergencyCheck => 1,
            IntakePhase::Insurance => 2,
            IntakePhase::ChiefComplaint => 3,
            IntakePhase::Demographics => 4,
            IntakePhase::ContactInfo => 5,
            IntakePhase::ProviderSelection => 6,
            IntakePhase::AppointmentScheduling => 7,
            IntakePhase::Confirmation => 8,
            IntakePhase::Completed => 9,
        }
    }

    /// Whether a transition to `target` preserves phase monotonicity
    pub fn can_advance_to(&self, target: IntakePhase) -> bool {
        target.ordinal() >= self.ordinal()
    }

    /// Terminal phases accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntakePhase::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntakePhase::Greeting => "greeting",
            IntakePhase::EmergencyCheck => "emergency_check",
            IntakePhase::Insurance => "insurance",
            IntakePhase::ChiefComplaint => "chief_complaint",
            IntakePhase::Demographics => "demographics",
            IntakePhase::ContactInfo => "contact_info",
            IntakePhase::ProviderSelection => "provider_selection",
            IntakePhase::AppointmentScheduling => "appointment_scheduling",
            IntakePhase::Confirmation => "confirmation",
            IntakePhase::Completed => "completed",
        }
    }
}

impl std::fmt::Display for IntakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
