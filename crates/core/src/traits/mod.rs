//! Collaborator traits
//!
//! The core consumes external services exclusively through these
//! interfaces; concrete vendors live behind them.

pub mod collaborators;
pub mod speech;
pub mod transport;

pub use collaborators::{
    AddressValidator, AppointmentSlot, ChoiceClassifier, Classification, ConfirmationSender,
    Provider, ProviderDirectory,
};
pub use speech::{SpeechToText, TextToSpeech, TranscriptEvent, TranscriptSource};
pub use transport::{MediaSink, MediaSource, TransportEvent};
