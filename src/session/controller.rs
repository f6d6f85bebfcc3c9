//! Orchestration of the listen → understand → dispatch → speak cycle
//!
//! The controller wires the assistant, the intent router and the feedback
//! queue together:
//! - External commands (start/stop/speak) are validated against the current
//!   state and applied synchronously
//! - Internal completions (models ready, recognition done, speech finished)
//!   arrive as signals handled by the worker thread
//!
//! Every entry into dispatching reaches idle again exactly once, on every
//! outcome path, including handler failures.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assistant::Assistant;
use crate::config::TellerConfig;
use crate::engines::{AccountState, AudioCapture, CalendarStore, Dialer};
use crate::intent::router::REPROMPT;
use crate::intent::{HandlerOutcome, IntentRouter, RecognitionResult};
use crate::models::{BundleStatus, ModelBundle};
use crate::speech::{SpeechFeedback, Utterance};
use crate::{Result, TellerError};

/// Orchestration state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerState {
    /// Model loads have not completed yet; listening is disabled.
    #[default]
    AwaitingModels,
    /// Ready for a new session.
    Idle,
    /// A session is streaming captured audio.
    Listening,
    /// Recognition finished; the intent handler is running.
    Dispatching,
    /// The session's spoken response is playing.
    Speaking,
}

impl ControllerState {
    /// Check if a new session can be started.
    pub fn is_idle(&self) -> bool {
        matches!(self, ControllerState::Idle)
    }

    /// Check if a session is in progress (listening or processing).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ControllerState::Listening | ControllerState::Dispatching | ControllerState::Speaking
        )
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerState::AwaitingModels => write!(f, "AwaitingModels"),
            ControllerState::Idle => write!(f, "Idle"),
            ControllerState::Listening => write!(f, "Listening"),
            ControllerState::Dispatching => write!(f, "Dispatching"),
            ControllerState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Events emitted to the UI shell.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Both model loads completed; listening is enabled when all loaded.
    Ready(BundleStatus),
    /// The orchestration state changed.
    StateChanged(ControllerState),
    /// Recognition completed with the given intent (or no match).
    Recognized(Option<String>),
    /// A non-fatal error occurred.
    Error(String),
    /// The controller has shut down.
    Shutdown,
}

/// Internal completion signals handled by the worker.
enum SessionSignal {
    ModelsReady(BundleStatus),
    RecognitionDone(Option<RecognitionResult>),
    SpeechFinished(Uuid),
    Shutdown,
}

struct ControllerInner {
    config: TellerConfig,
    state: Mutex<ControllerState>,
    bundle: ModelBundle,
    capture: Arc<dyn AudioCapture>,
    router: IntentRouter,
    assistant: Mutex<Option<Arc<Assistant>>>,
    feedback: Mutex<Option<SpeechFeedback>>,
    event_tx: Sender<ControllerEvent>,
    signal_tx: Sender<SessionSignal>,
}

impl ControllerInner {
    fn set_state(&self, next: ControllerState) {
        let mut state = self.state.lock();
        debug!(from = %*state, to = %next, "state transition");
        *state = next;
        drop(state);
        let _ = self.event_tx.send(ControllerEvent::StateChanged(next));
    }

    /// Release the assistant session and return to idle.
    fn release_session(&self) {
        let assistant = self.assistant.lock().clone();
        if let Some(assistant) = assistant {
            assistant.finish();
        }
        self.set_state(ControllerState::Idle);
    }
}

/// Handle for driving the interaction core from the UI shell.
pub struct SessionController {
    inner: Arc<ControllerInner>,
    event_rx: Receiver<ControllerEvent>,
}

impl SessionController {
    /// Create the controller/worker pair over a model bundle and the
    /// external collaborators.
    pub fn new(
        config: TellerConfig,
        bundle: ModelBundle,
        capture: Arc<dyn AudioCapture>,
        calendar: Arc<dyn CalendarStore>,
        dialer: Arc<dyn Dialer>,
        account: Arc<dyn AccountState>,
    ) -> Result<(Self, SessionWorker)> {
        config.validate()?;

        let (event_tx, event_rx) = bounded(config.channel_buffer_size);
        let (signal_tx, signal_rx) = bounded(config.channel_buffer_size);

        let router = IntentRouter::new(
            account,
            dialer,
            calendar,
            config.banker_number.clone(),
            config.call_center_number.clone(),
        );

        let inner = Arc::new(ControllerInner {
            config,
            state: Mutex::new(ControllerState::AwaitingModels),
            bundle,
            capture,
            router,
            assistant: Mutex::new(None),
            feedback: Mutex::new(None),
            event_tx,
            signal_tx: signal_tx.clone(),
        });

        // Bridge the bundle's single-shot ready signal into the worker.
        let ready_tx = signal_tx;
        inner.bundle.on_ready(move |status| {
            let _ = ready_tx.send(SessionSignal::ModelsReady(status));
        })?;

        let worker = SessionWorker {
            inner: Arc::clone(&inner),
            signal_rx,
        };

        Ok((Self { inner, event_rx }, worker))
    }

    /// Current orchestration state.
    pub fn state(&self) -> ControllerState {
        *self.inner.state.lock()
    }

    /// Get a receiver for controller events.
    pub fn event_receiver(&self) -> Receiver<ControllerEvent> {
        self.event_rx.clone()
    }

    /// Start a listening session.
    ///
    /// Fails with `NotReady` before the models are loaded and with
    /// `InvalidState` while a session is in progress; neither changes state.
    pub fn start_listening(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        match *state {
            ControllerState::Idle => {}
            ControllerState::AwaitingModels => return Err(TellerError::NotReady),
            other => {
                return Err(TellerError::InvalidState {
                    expected: "Idle",
                    actual: other.to_string(),
                })
            }
        }

        let assistant = self
            .inner
            .assistant
            .lock()
            .clone()
            .ok_or(TellerError::NotReady)?;

        let signal_tx = self.inner.signal_tx.clone();
        assistant.listen(move |result| {
            let _ = signal_tx.send(SessionSignal::RecognitionDone(result));
        })?;

        *state = ControllerState::Listening;
        drop(state);
        let _ = self
            .inner
            .event_tx
            .send(ControllerEvent::StateChanged(ControllerState::Listening));
        Ok(())
    }

    /// Stop the current listening session and process what was captured.
    pub fn stop_listening(&self) -> Result<()> {
        let mut state = self.inner.state.lock();
        if *state != ControllerState::Listening {
            return Err(TellerError::InvalidState {
                expected: "Listening",
                actual: state.to_string(),
            });
        }

        let assistant = self
            .inner
            .assistant
            .lock()
            .clone()
            .ok_or(TellerError::NotReady)?;
        assistant.stop_listening()?;

        *state = ControllerState::Dispatching;
        drop(state);
        let _ = self
            .inner
            .event_tx
            .send(ControllerEvent::StateChanged(ControllerState::Dispatching));
        Ok(())
    }

    /// Enqueue a spoken utterance outside the session cycle.
    pub fn speak(&self, text: impl Into<String>, immediate: bool) -> Result<()> {
        let feedback = self
            .inner
            .feedback
            .lock()
            .clone()
            .ok_or(TellerError::NotReady)?;

        let utterance = if immediate {
            Utterance::immediate(text)
        } else {
            Utterance::new(text)
        };
        feedback.speak(utterance, |_| {})
    }

    /// Request controller shutdown.
    pub fn shutdown(&self) -> Result<()> {
        self.inner
            .signal_tx
            .send(SessionSignal::Shutdown)
            .map_err(|e| TellerError::Channel(format!("failed to send shutdown: {}", e)))
    }
}

/// Worker that applies internal completion signals to the state machine.
pub struct SessionWorker {
    inner: Arc<ControllerInner>,
    signal_rx: Receiver<SessionSignal>,
}

impl SessionWorker {
    /// Start the worker thread.
    pub fn start(self) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || self.run())
    }

    fn run(self) {
        info!("session controller started, awaiting models");

        loop {
            match self.signal_rx.recv() {
                Ok(SessionSignal::ModelsReady(status)) => self.on_models_ready(status),
                Ok(SessionSignal::RecognitionDone(result)) => self.on_recognition_done(result),
                Ok(SessionSignal::SpeechFinished(id)) => {
                    debug!(%id, "session utterance finished");
                    self.inner.release_session();
                }
                Ok(SessionSignal::Shutdown) => {
                    info!("session controller shutting down");
                    if let Some(feedback) = self.inner.feedback.lock().clone() {
                        let _ = feedback.shutdown();
                    }
                    break;
                }
                Err(_) => {
                    warn!("signal channel disconnected");
                    break;
                }
            }
        }

        let _ = self.inner.event_tx.send(ControllerEvent::Shutdown);
        info!("session controller stopped");
    }

    fn on_models_ready(&self, status: BundleStatus) {
        let (understanding, synthesis) =
            match (self.inner.bundle.understanding(), self.inner.bundle.synthesis()) {
                (Some(u), Some(s)) if status.all_loaded() => (u, s),
                _ => {
                    error!(?status, "model load incomplete, listening stays disabled");
                    let _ = self.inner.event_tx.send(ControllerEvent::Error(format!(
                        "model load incomplete: understanding_ok={}, synthesis_ok={}",
                        status.understanding_ok, status.synthesis_ok
                    )));
                    return;
                }
            };

        let (feedback, feedback_worker) =
            SpeechFeedback::new(synthesis, self.inner.config.channel_buffer_size);
        let _ = feedback_worker.start();

        let assistant = Arc::new(Assistant::new(
            Arc::clone(&self.inner.capture),
            understanding,
            feedback.clone(),
            self.inner.config.recognition_timeout,
        ));

        *self.inner.feedback.lock() = Some(feedback);
        *self.inner.assistant.lock() = Some(assistant);

        self.inner.set_state(ControllerState::Idle);
        let _ = self.inner.event_tx.send(ControllerEvent::Ready(status));
        info!("models ready, listening enabled");
    }

    fn on_recognition_done(&self, result: Option<RecognitionResult>) {
        self.inner.set_state(ControllerState::Dispatching);
        let _ = self.inner.event_tx.send(ControllerEvent::Recognized(
            result.as_ref().map(|r| r.intent.clone()),
        ));

        match self.inner.router.dispatch(result) {
            HandlerOutcome::Spoken(text) => self.speak_and_release(text),
            HandlerOutcome::Silent => {
                debug!("silent outcome, releasing session");
                self.inner.release_session();
            }
            HandlerOutcome::Failed(e) => {
                // Handler failures end in the generic re-prompt rather than
                // a stuck session.
                warn!(error = %e, "handler failed, re-prompting");
                self.speak_and_release(REPROMPT.to_string());
            }
        }
    }

    fn speak_and_release(&self, text: String) {
        let feedback = match self.inner.feedback.lock().clone() {
            Some(feedback) => feedback,
            None => {
                error!("no feedback queue, releasing session without speech");
                self.inner.release_session();
                return;
            }
        };

        self.inner.set_state(ControllerState::Speaking);
        let signal_tx = self.inner.signal_tx.clone();
        let enqueued = feedback.speak(Utterance::new(text), move |id| {
            let _ = signal_tx.send(SessionSignal::SpeechFinished(id));
        });

        if let Err(e) = enqueued {
            error!(error = %e, "failed to enqueue session utterance");
            let _ = self.inner.event_tx.send(ControllerEvent::Error(e.to_string()));
            self.inner.release_session();
        }
    }
}
