//! Duplex audio transport interfaces
//!
//! The telephony provider opens one duplex media stream per call. The
//! receive and send halves are separate traits so the pipeline can drive
//! them from independent tasks.

use async_trait::async_trait;

use crate::error::Result;
use crate::frame::AudioChunk;

/// Events yielded by the inbound half of a media stream
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Initial metadata; delivered before any media
    Connected {
        call_id: String,
        stream_id: Option<String>,
    },
    /// One chunk of caller audio
    Media(AudioChunk),
    /// The provider ended the stream
    Stopped,
}

/// Inbound half of a duplex media stream
#[async_trait]
pub trait MediaSource: Send {
    /// Next event, or `None` once the connection is gone
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

/// Outbound half of a duplex media stream
#[async_trait]
pub trait MediaSink: Send {
    /// Send synthesized audio to the caller
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()>;

    /// Close the stream, ending the call
    async fn close(&mut self) -> Result<()>;
}
