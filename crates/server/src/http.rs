//! HTTP endpoints
//!
//! The webhook endpoint answers the telephony provider's call-setup
//! request with markup directing it to open a media stream WebSocket; the
//! rest is operational surface (health, readiness, metrics, a
//! development-gated session dump).

use axum::{
    extract::{Form, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use intake_agent_config::RuntimeEnvironment;

use crate::state::AppState;
use crate::websocket::media_stream_handler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/call", post(call_webhook))
        .route("/media/:call_id", get(media_stream_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/debug/sessions/:call_id", get(debug_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct CallSetup {
    #[serde(default)]
    call_sid: Option<String>,
}

/// Telephony call-setup webhook.
///
/// Responds with stream markup pointing the provider at the per-call media
/// WebSocket; the call identifier rides in the URL path.
async fn call_webhook(
    State(state): State<AppState>,
    Form(setup): Form<CallSetup>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let call_id = setup
        .call_sid
        .filter(|sid| !sid.is_empty())
        .unwrap_or_else(|| format!("CA{}", uuid::Uuid::new_v4().simple()));

    let stream_url = format!(
        "wss://{}/media/{}",
        state.settings.server.public_host, call_id
    );
    tracing::info!(call_id = %call_id, stream_url = %stream_url, "Call setup webhook");

    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Connect>
        <Stream url="{stream_url}" />
    </Connect>
</Response>"#
    );

    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness: the state store must be reachable before calls are routed in
async fn readiness_check(State(state): State<AppState>) -> Response {
    if state.store.healthy().await {
        Json(serde_json::json!({
            "status": "ready",
            "replicated_state": state.store.is_replicated(),
        }))
        .into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "state store unreachable").into_response()
    }
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Dump a live call session.
///
/// Open in development; everywhere else it requires the configured debug
/// token, and without one configured it is unreachable.
async fn debug_session(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let development = state.settings.environment == RuntimeEnvironment::Development;
    if !development {
        let authorized = match &state.settings.server.debug_token {
            Some(token) if !token.is_empty() => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == format!("Bearer {token}"))
                .unwrap_or(false),
            _ => false,
        };
        if !authorized {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }

    match state.store.get(&call_id).await {
        Some(session) => Json(session).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown call").into_response(),
    }
}
