//! Streaming call pipeline
//!
//! Assembles the ordered chain
//! `transport in → STT adapter → controller → TTS adapter → transport out`
//! and runs the optional secondary transcription path that taps raw
//! inbound audio into a directly-managed STT connection. Within one call
//! everything is strictly ordered; across calls, pipelines are fully
//! independent.

mod adapters;
mod call;
mod chain;
mod hybrid;

pub use adapters::{SttAdapter, TtsAdapter};
pub use call::{CallOutcome, CallPipeline, PipelineConfig};
pub use chain::{PassthroughProcessor, ProcessorChain, ProcessorChainBuilder};
pub use hybrid::{DirectAudioTap, DirectSttLink};
