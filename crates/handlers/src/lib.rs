//! Phase handlers for the intake conversation
//!
//! One handler per logical workflow. Each consumes one user utterance,
//! mutates the shared state store, and returns the next prompt (or `None`
//! to suppress double-prompting). Handlers are stateful: they own a small
//! sub-step cursor that survives across turns and across the two phases a
//! workflow may span, so a handler must never assume its first call starts
//! a fresh phase.
//!
//! Handlers never surface failures to the caller. Ambiguous input is
//! re-prompted with bounded retries and then accepted best-effort;
//! collaborator outages degrade to permissive defaults.

pub mod demographics;
mod insurance;
pub mod prompts;
mod scheduling;
mod symptom;

pub use demographics::{ContactPolicy, DemographicsHandler};
pub use insurance::InsuranceHandler;
pub use scheduling::SchedulingHandler;
pub use symptom::SymptomHandler;

use async_trait::async_trait;

use intake_agent_core::{CallSession, Result};

/// Common contract for all phase handlers
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Consume one user utterance against the given session snapshot.
    ///
    /// Returns the response to speak, or `None` when no prompt should be
    /// emitted this turn. All session mutation goes through the state
    /// store, never through the snapshot.
    async fn process_input(&self, input: &str, session: &CallSession) -> Result<Option<String>>;

    fn name(&self) -> &'static str;
}
