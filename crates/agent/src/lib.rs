//! Conversation controller
//!
//! The central frame processor of a call: routes finalized transcripts to
//! the phase handler owning the current workflow, handles one-shot
//! greeting, gates input while the agent is speaking, de-duplicates
//! repeated prompts, segments responses for TTS, and hands the finished
//! intake off to the notification dispatcher.

mod controller;
mod segment;
mod tasks;

pub use controller::{ControllerDeps, IntakeController};
pub use segment::split_sentences;
pub use tasks::TaskTracker;
