//! Address validation service
//!
//! Talks to an external validation endpoint when one is configured and
//! falls back to heuristic validation otherwise (or when the endpoint is
//! unreachable). Heuristic results are honest about their provenance via
//! `validated` and the validation message.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use intake_agent_config::AddressValidationConfig;
use intake_agent_core::{Address, AddressValidator, Error, Result};

const VALID_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

/// Placeholder street patterns that are never accepted as validated
const PLACEHOLDER_PATTERNS: &[&str] = &["123 main", "test address", "asdf", "none", "n/a"];

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    street: &'a str,
    city: &'a str,
    state: &'a str,
    zip: &'a str,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    validated: bool,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct AddressService {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl AddressService {
    pub fn new(config: &AddressValidationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    async fn validate_remote(
        &self,
        endpoint: &str,
        street: &str,
        city: &str,
        state: &str,
        zip: &str,
    ) -> Result<Address> {
        let response = self
            .client
            .post(endpoint)
            .json(&ValidateRequest {
                street,
                city,
                state,
                zip,
            })
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("address validator: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Collaborator(format!(
                "address validator returned {}",
                response.status()
            )));
        }

        let body: ValidateResponse = response
            .json()
            .await
            .map_err(|e| Error::Collaborator(format!("address validator: {e}")))?;

        Ok(Address {
            street: body.street.unwrap_or_else(|| street.to_string()),
            city: body.city.unwrap_or_else(|| city.to_string()),
            state: body.state.unwrap_or_else(|| state.to_string()),
            zip_code: body.zip.unwrap_or_else(|| zip.to_string()),
            validated: body.validated,
            validation_message: body.message,
        })
    }

    /// Heuristic validation used when no endpoint is configured
    fn validate_heuristic(street: &str, city: &str, state: &str, zip: &str) -> Address {
        let mut valid = true;
        let mut messages: Vec<&str> = Vec::new();

        if street.len() < 5 {
            valid = false;
            messages.push("street address appears incomplete");
        } else if !street.chars().any(|c| c.is_ascii_digit()) {
            valid = false;
            messages.push("street address missing house number");
        }

        if city.len() < 2 {
            valid = false;
            messages.push("city is required");
        }

        if !VALID_STATES.contains(&state.to_uppercase().as_str()) {
            valid = false;
            messages.push("invalid state code");
        }

        let zip_digits = zip.chars().filter(|c| c.is_ascii_digit()).count();
        if zip_digits != 5 && zip_digits != 9 {
            valid = false;
            messages.push("invalid zip code format");
        }

        let street_lower = street.to_lowercase();
        if PLACEHOLDER_PATTERNS.iter().any(|p| street_lower.contains(p)) {
            valid = false;
            messages.push("address appears to be a placeholder");
        }

        Address {
            street: street.to_string(),
            city: city.to_string(),
            state: state.to_uppercase(),
            zip_code: zip.to_string(),
            validated: valid,
            validation_message: Some(if messages.is_empty() {
                "address validation successful (heuristic)".to_string()
            } else {
                messages.join("; ")
            }),
        }
    }
}

#[async_trait]
impl AddressValidator for AddressService {
    async fn validate(&self, street: &str, city: &str, state: &str, zip: &str)
        -> Result<Address> {
        if let Some(endpoint) = &self.endpoint {
            match self.validate_remote(endpoint, street, city, state, zip).await {
                Ok(address) => return Ok(address),
                Err(err) => {
                    tracing::warn!(error = %err, "Remote address validation failed; using heuristic");
                }
            }
        }
        Ok(Self::validate_heuristic(street, city, state, zip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_accepts_plausible_address() {
        let address =
            AddressService::validate_heuristic("742 Evergreen Terrace", "Springfield", "IL", "62704");
        assert!(address.validated);
        assert_eq!(address.state, "IL");
    }

    #[test]
    fn test_heuristic_rejects_missing_house_number() {
        let address = AddressService::validate_heuristic("Evergreen Terrace", "Springfield", "IL", "62704");
        assert!(!address.validated);
        assert!(address
            .validation_message
            .unwrap()
            .contains("house number"));
    }

    #[test]
    fn test_heuristic_rejects_placeholder() {
        let address = AddressService::validate_heuristic("123 Main St", "Nowhere", "CA", "90210");
        assert!(!address.validated);
    }

    #[test]
    fn test_heuristic_rejects_bad_state_and_zip() {
        let address = AddressService::validate_heuristic("55 Oak Street", "Springfield", "ZZ", "123");
        assert!(!address.validated);
        let message = address.validation_message.unwrap();
        assert!(message.contains("state"));
        assert!(message.contains("zip"));
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_uses_heuristic() {
        let service = AddressService::new(&AddressValidationConfig::default());
        let address = service
            .validate("742 Evergreen Terrace", "Springfield", "IL", "62704")
            .await
            .unwrap();
        assert!(address.validated);
    }
}
