//! Per-call pipeline harness
//!
//! Owns one call end to end: runs the processor chain, pumps the duplex
//! transport on both sides, feeds speech signals from the TTS adapter back
//! into the controller, and drives the optional secondary transcription
//! path. When the transport closes or the controller hangs up, everything
//! is cancelled and joined within a bounded grace period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use intake_agent_core::{
    Frame, MediaSink, MediaSource, ProcessorContext, SpeechToText, TransportEvent,
};

use crate::chain::ProcessorChain;
use crate::hybrid::DirectSttLink;

/// Harness tunables
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the secondary directly-managed STT connection
    pub enable_direct_stt: bool,
    /// Idle threshold before the secondary connection gets a keepalive
    pub keepalive_idle: Duration,
    /// Keepalive loop wake interval
    pub keepalive_check: Duration,
    /// Grace period for cancelling background work at teardown
    pub teardown_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_direct_stt: true,
            keepalive_idle: Duration::from_secs(2),
            keepalive_check: Duration::from_millis(200),
            teardown_grace: Duration::from_secs(1),
        }
    }
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The pipeline emitted its end-of-stream marker (intake completed or
    /// transport signalled stop)
    Finished,
    /// The connection went away without a clean end marker
    Dropped,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Finished => "finished",
            CallOutcome::Dropped => "dropped",
        }
    }
}

pub struct CallPipeline {
    call_id: String,
    chain: ProcessorChain,
    config: PipelineConfig,
}

impl CallPipeline {
    pub fn new(call_id: impl Into<String>, chain: ProcessorChain, config: PipelineConfig) -> Self {
        Self {
            call_id: call_id.into(),
            chain,
            config,
        }
    }

    /// Run the call to completion.
    ///
    /// `direct_stt` supplies the secondary recognizer connection; it is
    /// ignored when the hybrid path is disabled in config.
    pub async fn run(
        self,
        mut source: Box<dyn MediaSource>,
        mut sink: Box<dyn MediaSink>,
        direct_stt: Option<Arc<dyn SpeechToText>>,
    ) -> CallOutcome {
        let call_id = self.call_id.clone();
        let started = Instant::now();
        metrics::gauge!("intake_active_calls").increment(1.0);

        let context = ProcessorContext::new(call_id.as_str());
        let (input_tx, mut output_rx) = self.chain.run(context);

        // Start signal initializes every processor (and triggers the
        // controller's one-shot greeting) before any media flows
        if input_tx.send(Frame::StreamStart).await.is_err() {
            tracing::error!(call_id = %call_id, "Chain refused start signal");
            metrics::gauge!("intake_active_calls").decrement(1.0);
            return CallOutcome::Dropped;
        }

        let direct_link = match (self.config.enable_direct_stt, direct_stt) {
            (true, Some(engine)) => {
                tracing::info!(call_id = %call_id, "Hybrid transcription enabled");
                Some(DirectSttLink::spawn(
                    call_id.clone(),
                    engine,
                    input_tx.clone(),
                    self.config.keepalive_idle,
                    self.config.keepalive_check,
                ))
            }
            _ => None,
        };
        let direct_tap = direct_link.as_ref().map(|l| l.tap());

        // Inbound pump: transport events become audio frames, teed into the
        // secondary path
        let receive_tx = input_tx.clone();
        let receive_call_id = call_id.clone();
        let receive_task = tokio::spawn(async move {
            let mut sent_end = false;
            while let Some(event) = source.next_event().await {
                match event {
                    TransportEvent::Connected { call_id, stream_id } => {
                        tracing::info!(
                            call_id = %call_id,
                            stream_id = stream_id.as_deref().unwrap_or(""),
                            "Media stream connected"
                        );
                    }
                    TransportEvent::Media(chunk) => {
                        if let Some(tap) = &direct_tap {
                            tap.send(chunk.payload.clone());
                        }
                        if receive_tx.send(Frame::AudioChunk(chunk)).await.is_err() {
                            return;
                        }
                    }
                    TransportEvent::Stopped => {
                        tracing::info!(call_id = %receive_call_id, "Transport signalled stop");
                        let _ = receive_tx.send(Frame::StreamEnd).await;
                        sent_end = true;
                        break;
                    }
                }
            }
            if !sent_end {
                let _ = receive_tx.send(Frame::StreamEnd).await;
            }
        });

        // Ordered feedback of speech signals into the chain input; a single
        // forwarder keeps start/stop pairs from racing each other
        let (loopback_tx, mut loopback_rx) = mpsc::channel::<Frame>(64);
        let loopback_input = input_tx.clone();
        let loopback_task = tokio::spawn(async move {
            while let Some(frame) = loopback_rx.recv().await {
                if loopback_input.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // Outbound pump: audio to the caller, speech signals fed back,
        // end marker closes the call
        let mut outcome = CallOutcome::Dropped;
        while let Some(frame) = output_rx.recv().await {
            match frame {
                Frame::AudioOutput(chunk) => {
                    if let Err(e) = sink.send_audio(chunk).await {
                        tracing::warn!(call_id = %call_id, error = %e, "Audio push failed; ending call");
                        break;
                    }
                }
                frame @ (Frame::SpeechStarted | Frame::SpeechStopped) => {
                    if loopback_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Frame::StreamEnd => {
                    outcome = CallOutcome::Finished;
                    break;
                }
                Frame::Error { stage, message, .. } => {
                    tracing::warn!(call_id = %call_id, stage = %stage, "Unhandled pipeline error: {message}");
                }
                _ => {}
            }
        }

        if let Err(e) = sink.close().await {
            tracing::debug!(call_id = %call_id, error = %e, "Transport close failed");
        }

        // Teardown: cancel the pumps, then the secondary path, then let the
        // chain tasks drain as their channels close
        receive_task.abort();
        let _ = receive_task.await;
        loopback_task.abort();
        let _ = loopback_task.await;
        if let Some(link) = direct_link {
            link.shutdown(self.config.teardown_grace).await;
        }
        drop(input_tx);

        let duration = started.elapsed();
        metrics::gauge!("intake_active_calls").decrement(1.0);
        metrics::counter!("intake_calls_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("intake_call_duration_seconds").record(duration.as_secs_f64());
        tracing::info!(
            call_id = %call_id,
            outcome = outcome.as_str(),
            duration_secs = duration.as_secs_f64(),
            "Call pipeline finished"
        );

        outcome
    }
}
