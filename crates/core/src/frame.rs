//! Frame types and the processor trait for the streaming pipeline
//!
//! Every event that moves through a call's processing chain is one variant
//! of the closed [`Frame`] union. Processors match exhaustively; there is no
//! runtime type sniffing.

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::speech::TranscriptSource;

/// A chunk of opaque encoded audio
///
/// The core never inspects sample data; payloads are whatever the telephony
/// transport and the speech vendors exchange (mu-law 8 kHz in the Twilio
/// deployment).
#[derive(Debug, Clone, Default)]
pub struct AudioChunk {
    pub payload: Vec<u8>,
}

impl AudioChunk {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Frame types that flow through the call pipeline
#[derive(Debug, Clone)]
pub enum Frame {
    /// Inbound caller audio from the duplex transport
    AudioChunk(AudioChunk),

    /// Partial transcript; logged for observability, never dispatched to
    /// phase handlers
    InterimTranscript {
        text: String,
        confidence: Option<f32>,
        source: TranscriptSource,
    },

    /// Finalized transcript, the only user-input event handlers ever see
    FinalTranscript {
        text: String,
        confidence: Option<f32>,
        source: TranscriptSource,
    },

    /// One outbound text segment of a logical agent turn
    Utterance { text: String, segment: usize },

    /// Synthesized audio headed back to the caller
    AudioOutput(AudioChunk),

    /// The TTS adapter began speaking
    SpeechStarted,

    /// The TTS adapter finished speaking
    SpeechStopped,

    /// Pipeline start signal; triggers one-shot initialization
    StreamStart,

    /// End-of-stream marker; downstream of the controller it doubles as the
    /// hang-up signal for the transport
    StreamEnd,

    /// Error surfaced by a pipeline stage
    Error {
        stage: String,
        message: String,
        recoverable: bool,
    },
}

impl Frame {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Frame::StreamEnd)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error { .. })
    }

    /// Stage name for tracing and metrics labels
    pub fn stage_name(&self) -> &'static str {
        match self {
            Frame::AudioChunk(_) => "audio_chunk",
            Frame::InterimTranscript { .. } => "interim_transcript",
            Frame::FinalTranscript { .. } => "final_transcript",
            Frame::Utterance { .. } => "utterance",
            Frame::AudioOutput(_) => "audio_output",
            Frame::SpeechStarted => "speech_started",
            Frame::SpeechStopped => "speech_stopped",
            Frame::StreamStart => "stream_start",
            Frame::StreamEnd => "stream_end",
            Frame::Error { .. } => "error",
        }
    }
}

/// Context passed to frame processors
#[derive(Debug, Clone, Default)]
pub struct ProcessorContext {
    /// Call identifier, also the state-store key
    pub call_id: String,
    /// Completed user turns so far
    pub turn_number: usize,
}

impl ProcessorContext {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            turn_number: 0,
        }
    }

    pub fn next_turn(&mut self) {
        self.turn_number += 1;
    }
}

/// Frame processor for pipeline stages
///
/// Each processor receives frames, processes them, and emits zero or more
/// output frames. Processors run in separate tokio tasks connected by
/// channels; within one call, frames are processed strictly in arrival
/// order.
#[async_trait]
pub trait FrameProcessor: Send + Sync + 'static {
    /// Process a frame and emit output frames
    async fn process(&self, frame: Frame, context: &mut ProcessorContext) -> Result<Vec<Frame>>;

    /// Processor name for tracing
    fn name(&self) -> &'static str;

    /// Called once when the pipeline starts
    async fn on_start(&self, _context: &mut ProcessorContext) -> Result<()> {
        Ok(())
    }

    /// Called once when the pipeline stops
    async fn on_stop(&self, _context: &mut ProcessorContext) -> Result<()> {
        Ok(())
    }
}
