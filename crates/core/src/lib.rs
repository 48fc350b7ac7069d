//! Core traits and types for the intake voice agent
//!
//! This crate provides foundational types used across all other crates:
//! - The frame tagged union and `FrameProcessor` trait for the streaming pipeline
//! - The call session data model (phases, patient record, transcript)
//! - Collaborator traits for pluggable backends (STT, TTS, transport,
//!   address validation, provider lookup, classification, notification)
//! - Error types

pub mod error;
pub mod frame;
pub mod phase;
pub mod session;
pub mod traits;

pub use error::{Error, Result};
pub use frame::{AudioChunk, Frame, FrameProcessor, ProcessorContext};
pub use phase::IntakePhase;
pub use session::{
    Address, CallSession, Insurance, PatientInfo, Speaker, TranscriptEntry,
    MEMBER_ID_PLACEHOLDER,
};

pub use traits::{
    // Speech
    SpeechToText, TextToSpeech, TranscriptEvent, TranscriptSource,
    // Transport
    MediaSink, MediaSource, TransportEvent,
    // Collaborators
    AddressValidator, AppointmentSlot, ChoiceClassifier, Classification,
    ConfirmationSender, Provider, ProviderDirectory,
};
