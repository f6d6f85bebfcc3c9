//! Spoken feedback
//!
//! Serializes all spoken-utterance requests so only one utterance plays at a
//! time, in submission order, each with a completion notification.

pub mod feedback;

pub use feedback::{FeedbackEvent, FeedbackWorker, SpeechFeedback, Utterance};
