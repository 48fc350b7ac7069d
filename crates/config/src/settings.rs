//! Settings structs
//!
//! Gating behavior that the source system hard-coded (which environments
//! skip email collection, who may hit the debug endpoint) is expressed here
//! as explicit policy fields with environment-derived defaults.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub state: StateStoreConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub contact: ContactPolicy,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub address_validation: AddressValidationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.state.backend == StateBackend::Scylla && self.state.scylla_hosts.is_empty() {
            return Err(ConfigError::Invalid(
                "state.scylla_hosts must not be empty when the scylla backend is selected".into(),
            ));
        }
        if self.state.ttl_seconds < 3600 {
            tracing::warn!(
                ttl_seconds = self.state.ttl_seconds,
                "state TTL below one hour; long calls may lose state"
            );
        }
        if self.classifier.enabled && self.classifier.endpoint.is_empty() {
            return Err(ConfigError::Invalid(
                "classifier.endpoint required when classifier.enabled".into(),
            ));
        }
        Ok(())
    }

    /// Whether email should be collected on calls in this deployment
    pub fn collect_email(&self) -> bool {
        self.contact
            .collect_email
            .unwrap_or_else(|| self.environment.is_production())
    }
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable host used in webhook stream URLs
    #[serde(default = "default_public_host")]
    pub public_host: String,
    /// Token required for the session debug endpoint outside development
    #[serde(default)]
    pub debug_token: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_host() -> String {
    "localhost:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_host: default_public_host(),
            debug_token: None,
        }
    }
}

/// Which state-store backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Volatile in-process map
    #[default]
    Memory,
    /// Replicated store with per-key TTL
    Scylla,
}

/// Conversation state store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStoreConfig {
    #[serde(default)]
    pub backend: StateBackend,
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    /// Entry lifetime, refreshed on every write. A call can never resume
    /// after transport loss, so this only bounds leak cleanup.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}

fn default_keyspace() -> String {
    "intake_agent".to_string()
}

fn default_ttl_seconds() -> u32 {
    3600
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Memory,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_keyspace(),
            ttl_seconds: default_ttl_seconds(),
            replication_factor: default_replication_factor(),
        }
    }
}

/// Streaming pipeline tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Run the secondary directly-managed STT connection
    #[serde(default = "default_true")]
    pub enable_direct_stt: bool,
    /// Idle threshold before the secondary connection gets a keepalive
    #[serde(default = "default_keepalive_idle_ms")]
    pub keepalive_idle_ms: u64,
    /// How often the keepalive loop wakes to check for idleness
    #[serde(default = "default_keepalive_check_ms")]
    pub keepalive_check_ms: u64,
    /// One-time settle delay after warming the TTS engine
    #[serde(default = "default_tts_settle_ms")]
    pub tts_settle_ms: u64,
    /// Delay before the single retry of a failed TTS push
    #[serde(default = "default_push_retry_delay_ms")]
    pub push_retry_delay_ms: u64,
    /// Timeout applied to every external collaborator call
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_keepalive_idle_ms() -> u64 {
    2000
}

fn default_keepalive_check_ms() -> u64 {
    200
}

fn default_tts_settle_ms() -> u64 {
    150
}

fn default_push_retry_delay_ms() -> u64 {
    500
}

fn default_collaborator_timeout_secs() -> u64 {
    5
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enable_direct_stt: default_true(),
            keepalive_idle_ms: default_keepalive_idle_ms(),
            keepalive_check_ms: default_keepalive_check_ms(),
            tts_settle_ms: default_tts_settle_ms(),
            push_retry_delay_ms: default_push_retry_delay_ms(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// Contact-collection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPolicy {
    /// Override for email collection; unset derives from the environment
    /// (collected only in production)
    #[serde(default)]
    pub collect_email: Option<bool>,
    /// Address auto-filled when email collection is skipped
    #[serde(default = "default_test_email")]
    pub test_email: String,
}

fn default_test_email() -> String {
    "intake-test@example.com".to_string()
}

impl Default for ContactPolicy {
    fn default() -> Self {
        Self {
            collect_email: None,
            test_email: default_test_email(),
        }
    }
}

/// LLM choice-classifier fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI-compatible chat-completions endpoint
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            model: default_classifier_model(),
            timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// Confirmation notification dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Webhook that accepts the confirmation payload
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// Address validation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressValidationConfig {
    /// HTTP validator endpoint; unset means heuristic-only validation
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AddressValidationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_collaborator_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Graceful shutdown timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight calls to finish naturally
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    /// Grace period for per-call background tasks during teardown
    #[serde(default = "default_task_grace_ms")]
    pub task_grace_ms: u64,
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_task_grace_ms() -> u64 {
    1000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout_secs(),
            task_grace_ms: default_task_grace_ms(),
        }
    }
}
