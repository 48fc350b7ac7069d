//! Speech vendor adapters for the frame chain
//!
//! `SttAdapter` consumes inbound audio frames and emits transcript frames;
//! `TtsAdapter` consumes utterance frames and emits speech signals plus
//! synthesized audio. Both keep the vendor traits entirely behind the
//! frame protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use intake_agent_core::{
    Frame, FrameProcessor, ProcessorContext, Result, SpeechToText, TextToSpeech, TranscriptSource,
};

/// Bridges a speech recognizer into the chain
pub struct SttAdapter {
    engine: Arc<dyn SpeechToText>,
    source: TranscriptSource,
}

impl SttAdapter {
    pub fn new(engine: Arc<dyn SpeechToText>) -> Self {
        Self {
            engine,
            source: TranscriptSource::Pipeline,
        }
    }

    fn events_to_frames(&self, events: Vec<intake_agent_core::TranscriptEvent>) -> Vec<Frame> {
        events
            .into_iter()
            .filter(|e| !e.text.trim().is_empty())
            .map(|e| {
                metrics::counter!(
                    "intake_transcripts_total",
                    "source" => self.source.as_str(),
                    "final" => if e.is_final { "true" } else { "false" }
                )
                .increment(1);
                if e.is_final {
                    Frame::FinalTranscript {
                        text: e.text,
                        confidence: e.confidence,
                        source: self.source,
                    }
                } else {
                    Frame::InterimTranscript {
                        text: e.text,
                        confidence: e.confidence,
                        source: self.source,
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl FrameProcessor for SttAdapter {
    async fn process(&self, frame: Frame, _context: &mut ProcessorContext) -> Result<Vec<Frame>> {
        match frame {
            Frame::AudioChunk(chunk) => {
                if let Err(e) = self.engine.feed(&chunk.payload).await {
                    tracing::warn!(engine = self.engine.name(), error = %e, "STT feed failed");
                    return Ok(vec![]);
                }
                Ok(self.events_to_frames(self.engine.drain().await))
            }

            Frame::StreamEnd => {
                // Flush anything the recognizer still holds before the end
                // marker moves on
                if let Err(e) = self.engine.finish().await {
                    tracing::debug!(engine = self.engine.name(), error = %e, "STT finish failed");
                }
                let mut frames = self.events_to_frames(self.engine.drain().await);
                frames.push(Frame::StreamEnd);
                Ok(frames)
            }

            other => Ok(vec![other]),
        }
    }

    fn name(&self) -> &'static str {
        "stt_adapter"
    }
}

/// Bridges a speech synthesizer into the chain
pub struct TtsAdapter {
    engine: Arc<dyn TextToSpeech>,
    /// Delay before the single retry of a failed synthesis push
    push_retry_delay: Duration,
}

impl TtsAdapter {
    pub fn new(engine: Arc<dyn TextToSpeech>, push_retry_delay: Duration) -> Self {
        Self {
            engine,
            push_retry_delay,
        }
    }
}

#[async_trait]
impl FrameProcessor for TtsAdapter {
    async fn process(&self, frame: Frame, _context: &mut ProcessorContext) -> Result<Vec<Frame>> {
        match frame {
            Frame::StreamStart => {
                // Must tolerate a start signal before (or without) any text
                if let Err(e) = self.engine.start().await {
                    tracing::warn!(engine = self.engine.name(), error = %e, "TTS start failed");
                }
                Ok(vec![Frame::StreamStart])
            }

            Frame::Utterance { text, segment } => {
                // One retry after a short delay, then the segment is
                // abandoned; a lost segment beats a stalled call
                let chunks = match self.engine.synthesize(&text).await {
                    Ok(chunks) => chunks,
                    Err(first_err) => {
                        tracing::warn!(
                            engine = self.engine.name(),
                            segment,
                            error = %first_err,
                            "TTS push failed; retrying once"
                        );
                        tokio::time::sleep(self.push_retry_delay).await;
                        match self.engine.synthesize(&text).await {
                            Ok(chunks) => chunks,
                            Err(retry_err) => {
                                metrics::counter!("intake_tts_segments_total", "outcome" => "abandoned")
                                    .increment(1);
                                tracing::error!(
                                    engine = self.engine.name(),
                                    segment,
                                    error = %retry_err,
                                    "TTS retry failed; abandoning segment"
                                );
                                return Ok(vec![]);
                            }
                        }
                    }
                };

                metrics::counter!("intake_tts_segments_total", "outcome" => "synthesized")
                    .increment(1);
                let mut out = Vec::with_capacity(chunks.len() + 2);
                out.push(Frame::SpeechStarted);
                out.extend(chunks.into_iter().map(Frame::AudioOutput));
                out.push(Frame::SpeechStopped);
                Ok(out)
            }

            other => Ok(vec![other]),
        }
    }

    fn name(&self) -> &'static str {
        "tts_adapter"
    }
}
