//! HTTP and WebSocket server for the intake voice agent
//!
//! One axum router serves the telephony webhook, the per-call media
//! WebSocket, health/readiness probes, Prometheus metrics, and a
//! development-gated session debug endpoint.

pub mod http;
pub mod shutdown;
pub mod speech;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use shutdown::ShutdownCoordinator;
pub use speech::{SilentSpeechEngines, SpeechEngines};
pub use state::AppState;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("session error: {0}")]
    Session(String),
    #[error("transport error: {0}")]
    Transport(String),
}
