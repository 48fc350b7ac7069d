//! Appointment-confirmation dispatch
//!
//! The controller triggers this fire-and-forget with retry; delivery
//! mechanics live behind a webhook so email/SMS vendors stay out of the
//! call path. The no-op sender is used when notifications are disabled.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use intake_agent_config::NotificationConfig;
use intake_agent_core::{CallSession, ConfirmationSender, Error, Result};

pub struct WebhookConfirmationSender {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookConfirmationSender {
    pub fn new(config: &NotificationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ConfirmationSender for WebhookConfirmationSender {
    async fn send_confirmation(&self, session: &CallSession) -> Result<bool> {
        let info = &session.patient_info;
        let payload = json!({
            "call_id": session.call_id,
            "email": info.email,
            "phone_number": info.phone_number,
            "provider": info.selected_provider,
            "appointment_datetime": info.appointment_datetime,
            "chief_complaint": info.chief_complaint,
            "insurance": info.insurance,
            "address": info.address,
            "transcript": session.transcript,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("notification dispatch: {e}")))?;

        let accepted = response.status().is_success();
        if !accepted {
            tracing::warn!(
                call_id = %session.call_id,
                status = %response.status(),
                "Confirmation dispatch rejected"
            );
        }
        Ok(accepted)
    }
}

/// Sender used when notifications are disabled; always reports success
#[derive(Default)]
pub struct NoopConfirmationSender;

#[async_trait]
impl ConfirmationSender for NoopConfirmationSender {
    async fn send_confirmation(&self, session: &CallSession) -> Result<bool> {
        tracing::info!(call_id = %session.call_id, "Notifications disabled; skipping confirmation");
        Ok(true)
    }
}
