//! Call session data model
//!
//! One `CallSession` exists per phone call, keyed by the opaque call
//! identifier delivered by the telephony transport. The patient record is
//! built incrementally: fields start unset and are filled as phases
//! complete. A field may be overwritten within its owning phase but is not
//! touched by later phases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::IntakePhase;

/// Sentinel some upstream systems emit for a member ID that was promised but
/// never captured. Insurance is not considered complete while this value is
/// stored.
pub const MEMBER_ID_PLACEHOLDER: &str = "to be provided";

/// Patient mailing address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    /// True only when an external validator confirmed the address
    #[serde(default)]
    pub validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,
}

/// Insurance coverage details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insurance {
    pub payer_name: String,
    pub member_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_number: Option<String>,
}

impl Insurance {
    pub fn new(payer_name: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            payer_name: payer_name.into(),
            member_id: member_id.into(),
            group_number: None,
        }
    }

    /// Both fields captured and the member ID is a real value
    pub fn is_complete(&self) -> bool {
        !self.payer_name.is_empty()
            && !self.member_id.is_empty()
            && self.member_id != MEMBER_ID_PLACEHOLDER
    }
}

/// Patient record built up over the course of the call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance: Option<Insurance>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    /// Self-reported discomfort on a 1-10 scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_level: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name of the chosen provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_datetime: Option<DateTime<Utc>>,
}

impl PatientInfo {
    /// Insurance captured with a usable member ID
    pub fn insurance_complete(&self) -> bool {
        self.insurance.as_ref().is_some_and(|i| i.is_complete())
    }
}

/// Who spoke a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

/// One entry in the append-only call transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub text: String,
}

/// Root aggregate for one phone call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Opaque identifier from the telephony provider, stable for the call
    pub call_id: String,
    /// The single active phase
    #[serde(default)]
    pub phase: IntakePhase,
    #[serde(default)]
    pub patient_info: PatientInfo,
    /// Count of handler-detected ambiguous inputs; never decremented
    #[serde(default)]
    pub error_count: u32,
    pub started_at: DateTime<Utc>,
    /// Append-only audit trail, also used for notification content
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            phase: IntakePhase::default(),
            patient_info: PatientInfo::default(),
            error_count: 0,
            started_at: Utc::now(),
            transcript: Vec::new(),
        }
    }

    /// Append a transcript entry stamped now
    pub fn add_transcript_entry(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            timestamp: Utc::now(),
            speaker,
            text: text.into(),
        });
    }

    /// The last `n` transcript entries, oldest first
    pub fn recent_transcript(&self, n: usize) -> &[TranscriptEntry] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = CallSession::new("CA123");
        assert_eq!(session.phase, IntakePhase::Greeting);
        assert_eq!(session.error_count, 0);
        assert!(session.transcript.is_empty());
        assert!(session.patient_info.insurance.is_none());
    }

    #[test]
    fn test_insurance_completeness() {
        let mut info = PatientInfo::default();
        assert!(!info.insurance_complete());

        info.insurance = Some(Insurance::new("Aetna", ""));
        assert!(!info.insurance_complete());

        info.insurance = Some(Insurance::new("Aetna", MEMBER_ID_PLACEHOLDER));
        assert!(!info.insurance_complete());

        info.insurance = Some(Insurance::new("Aetna", "ABC12345"));
        assert!(info.insurance_complete());
    }

    #[test]
    fn test_transcript_append_order() {
        let mut session = CallSession::new("CA123");
        session.add_transcript_entry(Speaker::Assistant, "Hello");
        session.add_transcript_entry(Speaker::User, "Hi");
        session.add_transcript_entry(Speaker::User, "I have Aetna");

        assert_eq!(session.transcript.len(), 3);
        let recent = session.recent_transcript(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "Hi");
        assert_eq!(recent[1].text, "I have Aetna");
    }

    #[test]
    fn test_session_json_round_trip() {
        let mut session = CallSession::new("CA456");
        session.phase = IntakePhase::ContactInfo;
        session.patient_info.phone_number = Some("(555) 123-4567".into());
        session.add_transcript_entry(Speaker::User, "my number is 5551234567");

        let json = serde_json::to_string(&session).unwrap();
        let back: CallSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.call_id, "CA456");
        assert_eq!(back.phase, IntakePhase::ContactInfo);
        assert_eq!(back.patient_info.phone_number.as_deref(), Some("(555) 123-4567"));
        assert_eq!(back.transcript.len(), 1);
    }
}
