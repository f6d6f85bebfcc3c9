//! Single-session voice assistant state machine
//!
//! The assistant owns the one session record and is its only writer. A
//! session runs `Idle → Listening → Processing → Idle`; the router and the
//! feedback queue never touch session state directly, they only report
//! outcomes back through the controller.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engines::{AudioCapture, UnderstandingEngine};
use crate::intent::RecognitionResult;
use crate::speech::{SpeechFeedback, Utterance};
use crate::{Result, TellerError};
use uuid::Uuid;

/// Session state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session in progress.
    #[default]
    Idle,
    /// Actively streaming captured audio into the understanding model.
    Listening,
    /// Capture finalized; recognition and dispatch in flight.
    Processing,
}

impl SessionState {
    /// Check if no session is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Check if currently listening.
    pub fn is_listening(&self) -> bool {
        matches!(self, SessionState::Listening)
    }

    /// Check if processing a finalized capture.
    pub fn is_processing(&self) -> bool {
        matches!(self, SessionState::Processing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Processing => write!(f, "Processing"),
        }
    }
}

fn invalid_state(expected: &'static str, actual: SessionState) -> TellerError {
    TellerError::InvalidState {
        expected,
        actual: actual.to_string(),
    }
}

/// The listen → understand → speak session front end.
///
/// At most one session exists at a time; a second `listen` is refused until
/// the prior session's terminal callback has fired and `finish` returned the
/// state to idle.
pub struct Assistant {
    state: Arc<Mutex<SessionState>>,
    capture: Arc<dyn AudioCapture>,
    understanding: Arc<dyn UnderstandingEngine>,
    feedback: SpeechFeedback,
    recognition_timeout: Duration,
}

impl Assistant {
    /// Create an assistant over the capture device, understanding engine and
    /// feedback queue.
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        understanding: Arc<dyn UnderstandingEngine>,
        feedback: SpeechFeedback,
        recognition_timeout: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
            capture,
            understanding,
            feedback,
            recognition_timeout,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Start a listening session.
    ///
    /// Streams captured audio until the capture finalizes, then runs
    /// recognition once and invokes `on_result` exactly once with the
    /// result or the no-match signal.
    ///
    /// Fails with `InvalidState` when a session is already in progress, and
    /// with `Capture` (state untouched) when the audio stream cannot start.
    pub fn listen<F>(&self, on_result: F) -> Result<()>
    where
        F: FnOnce(Option<RecognitionResult>) + Send + 'static,
    {
        let mut state = self.state.lock();
        if !state.is_idle() {
            return Err(invalid_state("Idle", *state));
        }

        // Start the stream before transitioning so a capture failure leaves
        // no partial state behind.
        let frames = self.capture.start_streaming()?;
        *state = SessionState::Listening;
        drop(state);

        info!("session started, listening");

        let state = Arc::clone(&self.state);
        let understanding = Arc::clone(&self.understanding);
        let frame_timeout = self.recognition_timeout;

        thread::spawn(move || {
            let mut audio: Vec<f32> = Vec::new();
            loop {
                match frames.recv_timeout(frame_timeout) {
                    Ok(frame) => audio.extend_from_slice(&frame),
                    Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        // Bounded wait: a stalled capture is treated as
                        // finalized so the session cannot get stuck.
                        warn!("no capture frame within bound, finalizing with buffered audio");
                        break;
                    }
                }
            }

            *state.lock() = SessionState::Processing;
            debug!(samples = audio.len(), "capture finalized, recognizing");

            let result = understanding.recognize(&audio);
            debug!(intent = result.as_ref().map(|r| r.intent.as_str()), "recognition complete");
            on_result(result);
        });

        Ok(())
    }

    /// Stop the current listening session.
    ///
    /// Finalizes the capture (flushing buffered audio for final recognition)
    /// and transitions to processing; the pending result callback still
    /// fires once recognition finalizes.
    pub fn stop_listening(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_listening() {
            return Err(invalid_state("Listening", *state));
        }

        self.capture.finalize();
        *state = SessionState::Processing;
        info!("capture stopped, processing");
        Ok(())
    }

    /// Release the session once the caller's processing has completed.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.is_processing() {
            *state = SessionState::Idle;
            info!("session finished, idle");
        } else {
            warn!(state = %*state, "finish called outside processing, ignored");
        }
    }

    /// Enqueue a spoken utterance. Does not change session state.
    pub fn speak<F>(&self, utterance: Utterance, on_finished: F) -> Result<()>
    where
        F: FnOnce(Uuid) + Send + 'static,
    {
        self.feedback.speak(utterance, on_finished)
    }
}
