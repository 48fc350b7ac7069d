//! Secondary direct-STT path
//!
//! Runs a second, directly-managed recognizer connection fed by tapping
//! the raw inbound audio stream. Its finalized transcripts are injected
//! into the same chain input the primary path uses; the controller never
//! needs to know which source produced a transcript. An independent
//! keepalive loop pings the connection whenever no audio has been
//! forwarded for a threshold interval, preventing idle-timeout
//! disconnection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use intake_agent_core::{Frame, SpeechToText, TranscriptSource};

pub struct DirectSttLink {
    audio_tx: mpsc::Sender<Vec<u8>>,
    forward_task: JoinHandle<()>,
    keepalive_task: JoinHandle<()>,
    engine: Arc<dyn SpeechToText>,
}

impl DirectSttLink {
    /// Start the secondary path: a forwarding task that feeds audio and
    /// injects resulting transcripts, and the keepalive loop.
    pub fn spawn(
        call_id: String,
        engine: Arc<dyn SpeechToText>,
        chain_input: mpsc::Sender<Frame>,
        keepalive_idle: Duration,
        keepalive_check: Duration,
    ) -> Self {
        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(256);
        let last_audio = Arc::new(Mutex::new(Instant::now()));

        let forward_engine = engine.clone();
        let forward_last_audio = last_audio.clone();
        let forward_call_id = call_id.clone();
        let forward_task = tokio::spawn(async move {
            while let Some(audio) = audio_rx.recv().await {
                *forward_last_audio.lock() = Instant::now();
                if let Err(e) = forward_engine.feed(&audio).await {
                    tracing::warn!(call_id = %forward_call_id, error = %e, "Direct STT feed failed");
                    continue;
                }
                for event in forward_engine.drain().await {
                    if event.text.trim().is_empty() {
                        continue;
                    }
                    metrics::counter!(
                        "intake_transcripts_total",
                        "source" => TranscriptSource::Direct.as_str(),
                        "final" => if event.is_final { "true" } else { "false" }
                    )
                    .increment(1);

                    let frame = if event.is_final {
                        tracing::info!(
                            call_id = %forward_call_id,
                            text = %event.text,
                            "Direct STT final transcript"
                        );
                        Frame::FinalTranscript {
                            text: event.text,
                            confidence: event.confidence,
                            source: TranscriptSource::Direct,
                        }
                    } else {
                        Frame::InterimTranscript {
                            text: event.text,
                            confidence: event.confidence,
                            source: TranscriptSource::Direct,
                        }
                    };
                    if chain_input.send(frame).await.is_err() {
                        tracing::debug!(call_id = %forward_call_id, "Chain input closed; direct STT stopping");
                        return;
                    }
                }
            }
        });

        let keepalive_engine = engine.clone();
        let keepalive_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(keepalive_check).await;
                let idle = last_audio.lock().elapsed();
                if idle >= keepalive_idle {
                    if let Err(e) = keepalive_engine.keepalive().await {
                        tracing::warn!(call_id = %call_id, error = %e, "Direct STT keepalive failed");
                        break;
                    }
                    tracing::debug!(
                        call_id = %call_id,
                        idle_ms = idle.as_millis() as u64,
                        "Direct STT keepalive sent"
                    );
                }
            }
        });

        Self {
            audio_tx,
            forward_task,
            keepalive_task,
            engine,
        }
    }

    /// Tee one chunk of raw inbound audio into the secondary path.
    ///
    /// Dropping a chunk under backpressure is acceptable here; the primary
    /// path still carries it.
    pub fn send_audio(&self, payload: Vec<u8>) {
        if let Err(e) = self.audio_tx.try_send(payload) {
            tracing::debug!(error = %e, "Direct STT audio dropped under backpressure");
        }
    }

    /// A cheap handle for the transport receive loop to tee audio through
    pub fn tap(&self) -> DirectAudioTap {
        DirectAudioTap {
            audio_tx: self.audio_tx.clone(),
        }
    }

    /// Stop both tasks and close the vendor connection, bounded by `grace`
    pub async fn shutdown(self, grace: Duration) {
        self.keepalive_task.abort();
        let _ = self.keepalive_task.await;

        drop(self.audio_tx);
        let mut forward = self.forward_task;
        if tokio::time::timeout(grace, &mut forward).await.is_err() {
            forward.abort();
            let _ = forward.await;
        }

        if let Err(e) = self.engine.finish().await {
            tracing::debug!(error = %e, "Direct STT finish failed");
        }
    }
}

/// Clonable audio tee handle for [`DirectSttLink`]
#[derive(Clone)]
pub struct DirectAudioTap {
    audio_tx: mpsc::Sender<Vec<u8>>,
}

impl DirectAudioTap {
    pub fn send(&self, payload: Vec<u8>) {
        if let Err(e) = self.audio_tx.try_send(payload) {
            tracing::debug!(error = %e, "Direct STT audio dropped under backpressure");
        }
    }
}
