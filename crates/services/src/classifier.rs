//! LLM-backed choice classifier
//!
//! Fallback used when menu selection cannot be resolved locally. Talks to
//! an OpenAI-compatible chat-completions endpoint and asks for strict JSON.
//! Any failure (network, bad JSON, unknown label) degrades to `Ok(None)` at
//! the call site; the classifier vote is optional by contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use intake_agent_config::ClassifierConfig;
use intake_agent_core::{ChoiceClassifier, Classification, Error, Result};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelPayload {
    label: String,
    #[serde(default)]
    confidence: f32,
}

pub struct LlmChoiceClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl LlmChoiceClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl ChoiceClassifier for LlmChoiceClassifier {
    async fn classify(
        &self,
        utterance: &str,
        labels: &[String],
    ) -> Result<Option<Classification>> {
        if labels.is_empty() {
            return Ok(None);
        }

        let label_list: String = labels.iter().map(|l| format!("- {l}\n")).collect();
        let body = json!({
            "model": self.config.model,
            "temperature": 0.0,
            "max_tokens": 60,
            "response_format": {"type": "json_object"},
            "messages": [
                {
                    "role": "system",
                    "content": "You are a strict classifier. Choose the single best matching \
                                label from the list. If none fit, return 'unknown' with \
                                confidence 0.0. Respond ONLY in JSON with keys: label (string) \
                                and confidence (0.0-1.0)."
                },
                {
                    "role": "user",
                    "content": format!("Labels:\n{label_list}\nUser input: {utterance}")
                }
            ]
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("classifier: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Collaborator(format!(
                "classifier returned {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Collaborator(format!("classifier: {e}")))?;

        let Some(content) = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Ok(None);
        };

        let Ok(payload) = serde_json::from_str::<LabelPayload>(&content) else {
            tracing::debug!(content = %content, "Classifier returned non-JSON content");
            return Ok(None);
        };

        if !labels.contains(&payload.label) {
            return Ok(None);
        }

        Ok(Some(Classification {
            label: payload.label,
            confidence: payload.confidence.clamp(0.0, 1.0),
        }))
    }
}
