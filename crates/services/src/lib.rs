//! Collaborator service implementations
//!
//! Everything here sits behind the collaborator traits in
//! `intake-agent-core`. Each service is built process-wide once and shared
//! across calls; failures are isolated per call by the handlers that
//! consume them.

mod address;
mod classifier;
mod notify;
mod providers;

pub use address::AddressService;
pub use classifier::LlmChoiceClassifier;
pub use notify::{NoopConfirmationSender, WebhookConfirmationSender};
pub use providers::MockProviderDirectory;
