//! External collaborator interfaces
//!
//! The acoustic engines, calendar storage, telephony and account state are
//! host-provided capabilities. The core only depends on these traits; every
//! implementation lives outside the crate (or in test fakes).

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;

use crate::intent::RecognitionResult;
use crate::Result;

/// Streaming microphone capture.
///
/// `start_streaming` hands back a channel of audio frames; the stream ends
/// when the capture is finalized and the sending side is dropped.
pub trait AudioCapture: Send + Sync {
    /// Begin streaming captured audio frames.
    ///
    /// Fails without side effects if the device is busy or permission was
    /// revoked.
    fn start_streaming(&self) -> Result<Receiver<Vec<f32>>>;

    /// Flush buffered audio and close the frame stream.
    fn finalize(&self);
}

/// Streaming speech-understanding model.
pub trait UnderstandingEngine: Send + Sync {
    /// Run recognition over a finalized capture.
    ///
    /// Called exactly once per session; `None` is the no-match signal.
    fn recognize(&self, audio: &[f32]) -> Option<RecognitionResult>;
}

/// Speech-synthesis engine.
pub trait SynthesisEngine: Send + Sync {
    /// Synthesize and play one utterance, blocking until playback completes.
    fn speak(&self, text: &str) -> Result<()>;
}

/// Calendar write authorization, as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarAccess {
    Authorized,
    Denied,
    Unknown,
}

/// Calendar event storage.
pub trait CalendarStore: Send + Sync {
    /// Current write-access status for calendar events.
    fn authorization_status(&self) -> CalendarAccess;

    /// Persist an event in the default (or first available) calendar.
    fn create_event(&self, start: DateTime<Utc>, end: DateTime<Utc>, title: &str) -> Result<()>;
}

/// Outbound telephony. Fire-and-forget; no result path comes back.
pub trait Dialer: Send + Sync {
    fn place_call(&self, number: &str);
}

/// Read-only view of the user's account.
pub trait AccountState: Send + Sync {
    /// Current balance, already formatted for speech (e.g. "23.45").
    fn current_balance(&self) -> String;
}
