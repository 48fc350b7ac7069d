//! Speech vendor interfaces
//!
//! STT and TTS are black boxes: STT accepts audio chunks and emits
//! transcript events, TTS accepts text and emits audio chunks. Vendor wire
//! protocols are out of scope; adapters in the pipeline crate bridge these
//! traits into the frame chain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::AudioChunk;

/// Which transcription path produced an event
///
/// The hybrid architecture runs two parallel STT connections; the
/// controller treats both identically, but metrics are tagged per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// The in-chain STT adapter
    Pipeline,
    /// The directly-managed secondary STT connection
    Direct,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Pipeline => "pipeline",
            TranscriptSource::Direct => "direct",
        }
    }
}

/// One transcription result from an STT engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    /// Finalized results are dispatched to handlers; interim results are
    /// logged only
    pub is_final: bool,
    pub confidence: Option<f32>,
}

/// Speech-to-text connection
///
/// Implementations hold a live vendor connection. Audio is pushed with
/// [`feed`](SpeechToText::feed); completed events are collected with
/// [`drain`](SpeechToText::drain). Both are expected to be cheap and
/// non-blocking relative to the audio cadence.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    /// Push a chunk of caller audio into the recognizer
    async fn feed(&self, audio: &[u8]) -> Result<()>;

    /// Take all transcript events that have become ready since the last call
    async fn drain(&self) -> Vec<TranscriptEvent>;

    /// No-op message preventing idle-timeout disconnection
    async fn keepalive(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and close the connection
    async fn finish(&self) -> Result<()> {
        Ok(())
    }

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Text-to-speech engine
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Prepare the engine for synthesis.
    ///
    /// Must tolerate being called before the first text submission and more
    /// than once.
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Synthesize one text segment to audio chunks
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioChunk>>;

    /// Engine name for logging
    fn name(&self) -> &str;
}
