//! Per-call media WebSocket
//!
//! Speaks the telephony provider's JSON stream envelope: a `connected`
//! preamble, a `start` event carrying the stream and call identifiers,
//! base64 `media` payloads in both directions, and a final `stop`. The
//! socket is split into a `MediaSource`/`MediaSink` pair that the call
//! pipeline pumps.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use intake_agent_agent::{ControllerDeps, IntakeController};
use intake_agent_core::{
    AudioChunk, Error, MediaSink, MediaSource, Result, TransportEvent,
};
use intake_agent_handlers::ContactPolicy;
use intake_agent_pipeline::{CallPipeline, PipelineConfig, ProcessorChain, SttAdapter, TtsAdapter};

use crate::state::AppState;

/// How many preamble messages to scan for the `start` event
const MAX_PREAMBLE_MESSAGES: usize = 5;
const PREAMBLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrade handler for `/media/:call_id`
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| run_media_stream(socket, call_id, state))
}

async fn run_media_stream(socket: WebSocket, mut call_id: String, state: AppState) {
    // Reject new calls during shutdown
    let Some(_call_guard) = state.shutdown.begin_call() else {
        tracing::warn!(call_id = %call_id, "Rejecting call during shutdown");
        let mut socket = socket;
        let _ = socket
            .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                code: 1001,
                reason: "service shutting down".into(),
            })))
            .await;
        return;
    };

    let (ws_tx, mut ws_rx) = socket.split();

    // Scan the preamble for the start event; the provider may reorder the
    // first few messages, so don't assume it comes first
    let mut stream_sid = None;
    let mut pending: VecDeque<TransportEvent> = VecDeque::new();
    let preamble = tokio::time::timeout(PREAMBLE_TIMEOUT, async {
        for _ in 0..MAX_PREAMBLE_MESSAGES {
            let Some(Ok(Message::Text(text))) = ws_rx.next().await else {
                return;
            };
            match parse_envelope(&text) {
                Some(Envelope::Start {
                    stream_sid: sid,
                    call_sid,
                }) => {
                    if let Some(call_sid) = call_sid {
                        call_id = call_sid;
                    }
                    stream_sid = Some(sid);
                    return;
                }
                Some(Envelope::Media(chunk)) => pending.push_back(TransportEvent::Media(chunk)),
                Some(Envelope::Stop) => {
                    pending.push_back(TransportEvent::Stopped);
                    return;
                }
                Some(Envelope::Connected) | None => {}
            }
        }
    })
    .await;

    if preamble.is_err() {
        tracing::warn!(call_id = %call_id, "Timed out waiting for stream start event");
    }
    if stream_sid.is_none() {
        tracing::warn!(call_id = %call_id, "No stream identifier extracted; outbound audio may fail");
    }

    if let Err(err) = state.store.create(&call_id).await {
        tracing::error!(call_id = %call_id, error = %err, "Failed to create call session");
        return;
    }

    let controller = IntakeController::new(
        call_id.as_str(),
        ControllerDeps {
            store: state.store.clone(),
            validator: state.validator.clone(),
            directory: state.directory.clone(),
            classifier: state.classifier.clone(),
            notifier: state.notifier.clone(),
            contact_policy: ContactPolicy {
                collect_email: state.settings.collect_email(),
                test_email: state.settings.contact.test_email.clone(),
            },
            collaborator_timeout: Duration::from_secs(
                state.settings.pipeline.collaborator_timeout_secs,
            ),
            tts_settle: Duration::from_millis(state.settings.pipeline.tts_settle_ms),
            dispatch_backoff: Duration::from_secs(2),
        },
    );

    let chain = ProcessorChain::builder(format!("call-{call_id}"))
        .processor(SttAdapter::new(state.speech.primary_stt(&call_id)))
        .processor(controller)
        .processor(TtsAdapter::new(
            state.speech.tts(&call_id),
            Duration::from_millis(state.settings.pipeline.push_retry_delay_ms),
        ))
        .build();

    let pipeline_config = PipelineConfig {
        enable_direct_stt: state.settings.pipeline.enable_direct_stt,
        keepalive_idle: Duration::from_millis(state.settings.pipeline.keepalive_idle_ms),
        keepalive_check: Duration::from_millis(state.settings.pipeline.keepalive_check_ms),
        teardown_grace: Duration::from_millis(state.settings.shutdown.task_grace_ms),
    };

    let direct_stt = state
        .settings
        .pipeline
        .enable_direct_stt
        .then(|| state.speech.direct_stt(&call_id));

    let source = WsMediaSource {
        stream: ws_rx,
        pending,
        call_id: call_id.clone(),
    };
    let sink = WsMediaSink {
        sink: ws_tx,
        stream_sid,
    };

    let outcome = CallPipeline::new(call_id.as_str(), chain, pipeline_config)
        .run(Box::new(source), Box::new(sink), direct_stt)
        .await;

    state.store.delete(&call_id).await;
    tracing::info!(call_id = %call_id, outcome = outcome.as_str(), "Media stream closed");
}

enum Envelope {
    Connected,
    Start {
        stream_sid: String,
        call_sid: Option<String>,
    },
    Media(AudioChunk),
    Stop,
}

/// Tolerant envelope parsing: unknown events and malformed JSON are
/// ignored rather than dropping the call
fn parse_envelope(text: &str) -> Option<Envelope> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("event").and_then(|e| e.as_str())? {
        "connected" => Some(Envelope::Connected),
        "start" => {
            let start = value.get("start")?;
            Some(Envelope::Start {
                stream_sid: start
                    .get("streamSid")
                    .and_then(|s| s.as_str())
                    .unwrap_or_default()
                    .to_string(),
                call_sid: start
                    .get("callSid")
                    .and_then(|s| s.as_str())
                    .map(String::from),
            })
        }
        "media" => {
            let payload = value.get("media")?.get("payload")?.as_str()?;
            let bytes = BASE64.decode(payload).ok()?;
            Some(Envelope::Media(AudioChunk::new(bytes)))
        }
        "stop" => Some(Envelope::Stop),
        other => {
            tracing::debug!(event = other, "Ignoring unknown stream event");
            None
        }
    }
}

struct WsMediaSource {
    stream: SplitStream<WebSocket>,
    /// Media seen while scanning the preamble, replayed first
    pending: VecDeque<TransportEvent>,
    call_id: String,
}

#[async_trait]
impl MediaSource for WsMediaSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match parse_envelope(&text) {
                    Some(Envelope::Media(chunk)) => return Some(TransportEvent::Media(chunk)),
                    Some(Envelope::Stop) => return Some(TransportEvent::Stopped),
                    Some(Envelope::Start {
                        stream_sid,
                        call_sid,
                    }) => {
                        return Some(TransportEvent::Connected {
                            call_id: call_sid.unwrap_or_else(|| self.call_id.clone()),
                            stream_id: Some(stream_sid),
                        })
                    }
                    _ => continue,
                },
                Ok(Message::Close(_)) => return Some(TransportEvent::Stopped),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(call_id = %self.call_id, error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
    }
}

struct WsMediaSink {
    sink: SplitSink<WebSocket, Message>,
    stream_sid: Option<String>,
}

#[async_trait]
impl MediaSink for WsMediaSink {
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()> {
        let envelope =
            encode_outbound_media(self.stream_sid.as_deref().unwrap_or(""), &chunk.payload);
        self.sink
            .send(Message::Text(envelope))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// Shared helper so tests and the binary agree on the sink payload shape
pub fn encode_outbound_media(stream_sid: &str, payload: &[u8]) -> String {
    serde_json::json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": { "payload": BASE64.encode(payload) },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let text = r#"{"event":"start","start":{"streamSid":"MZ123","callSid":"CA456"}}"#;
        match parse_envelope(text) {
            Some(Envelope::Start {
                stream_sid,
                call_sid,
            }) => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(call_sid.as_deref(), Some("CA456"));
            }
            _ => panic!("expected start envelope"),
        }
    }

    #[test]
    fn test_parse_media_event_decodes_payload() {
        let payload = BASE64.encode(b"\x01\x02\x03");
        let text = format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#);
        match parse_envelope(&text) {
            Some(Envelope::Media(chunk)) => assert_eq!(chunk.payload, vec![1, 2, 3]),
            _ => panic!("expected media envelope"),
        }
    }

    #[test]
    fn test_unknown_and_malformed_events_are_ignored() {
        assert!(parse_envelope("not json").is_none());
        assert!(parse_envelope(r#"{"event":"mark"}"#).is_none());
        assert!(parse_envelope(r#"{"no_event":true}"#).is_none());
    }

    #[test]
    fn test_outbound_media_shape() {
        let encoded = encode_outbound_media("MZ1", b"hi");
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["event"], "media");
        assert_eq!(value["streamSid"], "MZ1");
        assert_eq!(
            BASE64.decode(value["media"]["payload"].as_str().unwrap()).unwrap(),
            b"hi"
        );
    }
}
