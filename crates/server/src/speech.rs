//! Speech engine wiring
//!
//! Vendor STT/TTS integrations are deployment concerns; the server only
//! needs a factory that can mint per-call engine connections. The silent
//! engines below keep the whole stack runnable in development and tests
//! without any vendor credentials: they recognize nothing and synthesize
//! silence, but every pipeline mechanism still exercises end to end.

use std::sync::Arc;

use async_trait::async_trait;

use intake_agent_core::{AudioChunk, Result, SpeechToText, TextToSpeech, TranscriptEvent};

/// Per-call speech engine factory
pub trait SpeechEngines: Send + Sync {
    /// Recognizer for the in-chain primary path
    fn primary_stt(&self, call_id: &str) -> Arc<dyn SpeechToText>;

    /// Recognizer for the directly-managed secondary path
    fn direct_stt(&self, call_id: &str) -> Arc<dyn SpeechToText>;

    /// Synthesizer for outbound speech
    fn tts(&self, call_id: &str) -> Arc<dyn TextToSpeech>;
}

struct SilentStt;

#[async_trait]
impl SpeechToText for SilentStt {
    async fn feed(&self, _audio: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn drain(&self) -> Vec<TranscriptEvent> {
        Vec::new()
    }

    fn name(&self) -> &str {
        "silent-stt"
    }
}

struct SilentTts;

#[async_trait]
impl TextToSpeech for SilentTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioChunk>> {
        // 20 ms of mu-law silence per character keeps playback pacing
        // roughly proportional to the text length
        let samples = text.len().max(1) * 160;
        Ok(vec![AudioChunk::new(vec![0xFF; samples])])
    }

    fn name(&self) -> &str {
        "silent-tts"
    }
}

/// Development/test factory producing silent engines
#[derive(Default, Clone)]
pub struct SilentSpeechEngines;

impl SpeechEngines for SilentSpeechEngines {
    fn primary_stt(&self, _call_id: &str) -> Arc<dyn SpeechToText> {
        Arc::new(SilentStt)
    }

    fn direct_stt(&self, _call_id: &str) -> Arc<dyn SpeechToText> {
        Arc::new(SilentStt)
    }

    fn tts(&self, _call_id: &str) -> Arc<dyn TextToSpeech> {
        Arc::new(SilentTts)
    }
}
