//! Utterance queue with ordered playback
//!
//! A worker drains the queue one utterance at a time, synthesizing and
//! playing audio through the [`SynthesisEngine`], then invoking the
//! utterance's completion callback before starting the next.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engines::SynthesisEngine;
use crate::{Result, TellerError};

/// One unit of synthesized speech output.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Identity of this utterance, carried through events and completions.
    pub id: Uuid,
    /// Text to synthesize.
    pub text: String,
    /// Whether this utterance jumps the queue and plays next.
    pub immediate: bool,
}

impl Utterance {
    /// Create a queued utterance.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            immediate: false,
        }
    }

    /// Create an utterance that plays next, ahead of pending items.
    pub fn immediate(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            immediate: true,
        }
    }
}

/// Completion callback, invoked exactly once per utterance.
pub type OnFinished = Box<dyn FnOnce(Uuid) + Send>;

enum FeedbackCommand {
    Speak {
        utterance: Utterance,
        on_finished: OnFinished,
    },
    Shutdown,
}

/// Events emitted by the feedback worker.
#[derive(Debug, Clone)]
pub enum FeedbackEvent {
    /// Playback of an utterance began.
    Started(Uuid),
    /// Playback of an utterance completed.
    Finished(Uuid),
    /// Synthesis or playback failed; the completion callback still fired.
    Error { id: Uuid, error: String },
    /// Worker has shut down.
    Shutdown,
}

/// Handle for submitting utterances to the feedback worker.
#[derive(Clone)]
pub struct SpeechFeedback {
    command_tx: Sender<FeedbackCommand>,
    event_rx: Receiver<FeedbackEvent>,
}

impl SpeechFeedback {
    /// Create the handle/worker pair over a synthesis engine.
    pub fn new(
        engine: Arc<dyn SynthesisEngine>,
        buffer_size: usize,
    ) -> (Self, FeedbackWorker) {
        let (command_tx, command_rx) = bounded(buffer_size);
        let (event_tx, event_rx) = bounded(buffer_size);

        let handle = Self {
            command_tx,
            event_rx,
        };

        let worker = FeedbackWorker {
            engine,
            command_rx,
            event_tx,
        };

        (handle, worker)
    }

    /// Enqueue an utterance with its completion callback.
    ///
    /// The callback fires exactly once, after playback finishes or fails.
    pub fn speak<F>(&self, utterance: Utterance, on_finished: F) -> Result<()>
    where
        F: FnOnce(Uuid) + Send + 'static,
    {
        self.command_tx
            .send(FeedbackCommand::Speak {
                utterance,
                on_finished: Box::new(on_finished),
            })
            .map_err(|e| TellerError::Channel(format!("failed to enqueue utterance: {}", e)))
    }

    /// Get a receiver for playback events.
    pub fn event_receiver(&self) -> Receiver<FeedbackEvent> {
        self.event_rx.clone()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv_event(&self) -> Option<FeedbackEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Request worker shutdown.
    pub fn shutdown(&self) -> Result<()> {
        self.command_tx
            .send(FeedbackCommand::Shutdown)
            .map_err(|e| TellerError::Channel(format!("failed to send shutdown: {}", e)))
    }
}

struct PendingUtterance {
    utterance: Utterance,
    on_finished: OnFinished,
}

/// Worker that plays queued utterances one at a time.
pub struct FeedbackWorker {
    engine: Arc<dyn SynthesisEngine>,
    command_rx: Receiver<FeedbackCommand>,
    event_tx: Sender<FeedbackEvent>,
}

impl FeedbackWorker {
    /// Start the worker thread.
    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(self) {
        info!("speech feedback worker started");

        let mut queue: VecDeque<PendingUtterance> = VecDeque::new();
        'outer: loop {
            if queue.is_empty() {
                match self.command_rx.recv() {
                    Ok(cmd) => {
                        if !Self::accept(&mut queue, cmd) {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            // Pick up everything already submitted before playing, so
            // immediate utterances can overtake queued ones.
            while let Ok(cmd) = self.command_rx.try_recv() {
                if !Self::accept(&mut queue, cmd) {
                    break 'outer;
                }
            }

            if let Some(pending) = queue.pop_front() {
                self.play(pending);
            }
        }

        let _ = self.event_tx.send(FeedbackEvent::Shutdown);
        info!("speech feedback worker stopped");
    }

    /// Returns false on shutdown.
    fn accept(queue: &mut VecDeque<PendingUtterance>, cmd: FeedbackCommand) -> bool {
        match cmd {
            FeedbackCommand::Speak {
                utterance,
                on_finished,
            } => {
                debug!(id = %utterance.id, immediate = utterance.immediate, "utterance queued");
                let pending = PendingUtterance {
                    utterance,
                    on_finished,
                };
                if pending.utterance.immediate {
                    queue.push_front(pending);
                } else {
                    queue.push_back(pending);
                }
                true
            }
            FeedbackCommand::Shutdown => {
                info!("speech feedback worker shutting down");
                false
            }
        }
    }

    fn play(&self, pending: PendingUtterance) {
        let id = pending.utterance.id;
        let _ = self.event_tx.send(FeedbackEvent::Started(id));

        match self.engine.speak(&pending.utterance.text) {
            Ok(()) => {
                debug!(%id, "utterance finished");
                let _ = self.event_tx.send(FeedbackEvent::Finished(id));
            }
            Err(e) => {
                warn!(%id, error = %e, "utterance playback failed");
                let _ = self.event_tx.send(FeedbackEvent::Error {
                    id,
                    error: e.to_string(),
                });
            }
        }

        // The completion notification fires on failure too, so a failed
        // utterance still releases whoever is waiting on it.
        (pending.on_finished)(id);
    }
}
