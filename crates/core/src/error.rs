//! Error types shared across the workspace

use thiserror::Error;

/// Errors produced by the intake agent core and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// State store failure (backend down, serialization, unknown key)
    #[error("state store error: {0}")]
    State(String),

    /// A collaborator service could not be reached at all.
    ///
    /// Handlers catch this variant and fall back to permissive defaults;
    /// it must never abort a live call.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// A collaborator responded but the response was unusable
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Pipeline stage failure
    #[error("pipeline error in {stage}: {message}")]
    Pipeline { stage: String, message: String },

    /// Duplex transport failure (connection drop, send failure)
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration problem detected at startup
    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a pipeline error for a named stage
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Whether the error indicates an unreachable collaborator
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_predicate() {
        assert!(Error::Unavailable("usps".into()).is_unavailable());
        assert!(!Error::Collaborator("bad response".into()).is_unavailable());
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = Error::pipeline("tts_adapter", "push failed");
        assert_eq!(err.to_string(), "pipeline error in tts_adapter: push failed");
    }
}
