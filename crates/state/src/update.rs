//! Typed partial session update
//!
//! The source system merged loose keyword arguments into the session by
//! name; here the mergeable surface is a closed struct so a typo cannot
//! silently drop a field.

use chrono::{DateTime, Utc};

use intake_agent_core::{Address, CallSession, Insurance};

/// Fields that may be merged into a session. Unset fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub insurance: Option<Insurance>,
    pub chief_complaint: Option<String>,
    pub urgency_level: Option<u8>,
    pub address: Option<Address>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub selected_provider: Option<String>,
    pub appointment_datetime: Option<DateTime<Utc>>,
    /// Bump the ambiguous-input counter (never decremented)
    pub increment_error_count: bool,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insurance(mut self, insurance: Insurance) -> Self {
        self.insurance = Some(insurance);
        self
    }

    pub fn chief_complaint(mut self, complaint: impl Into<String>) -> Self {
        self.chief_complaint = Some(complaint.into());
        self
    }

    pub fn urgency_level(mut self, level: u8) -> Self {
        self.urgency_level = Some(level);
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn phone_number(mut self, phone: impl Into<String>) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn selected_provider(mut self, provider: impl Into<String>) -> Self {
        self.selected_provider = Some(provider.into());
        self
    }

    pub fn appointment_datetime(mut self, at: DateTime<Utc>) -> Self {
        self.appointment_datetime = Some(at);
        self
    }

    pub fn increment_error_count(mut self) -> Self {
        self.increment_error_count = true;
        self
    }

    /// Merge into the session in place
    pub fn apply(self, session: &mut CallSession) {
        let info = &mut session.patient_info;
        if let Some(insurance) = self.insurance {
            info.insurance = Some(insurance);
        }
        if let Some(complaint) = self.chief_complaint {
            info.chief_complaint = Some(complaint);
        }
        if let Some(level) = self.urgency_level {
            info.urgency_level = Some(level);
        }
        if let Some(address) = self.address {
            info.address = Some(address);
        }
        if let Some(phone) = self.phone_number {
            info.phone_number = Some(phone);
        }
        if let Some(email) = self.email {
            info.email = Some(email);
        }
        if let Some(provider) = self.selected_provider {
            info.selected_provider = Some(provider);
        }
        if let Some(at) = self.appointment_datetime {
            info.appointment_datetime = Some(at);
        }
        if self.increment_error_count {
            session.error_count += 1;
        }
    }
}
