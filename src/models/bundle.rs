//! Concurrent model loading with a single ready signal
//!
//! Both model loads start concurrently and independently; the ready signal
//! fires exactly once, only after both have completed. A failed load still
//! counts as completion, and the status records which side failed so
//! dependent features can be disabled.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::config::{Locale, LocaleModels};
use crate::engines::{SynthesisEngine, UnderstandingEngine};
use crate::{Result, TellerError};

/// Loads the two engines backing a locale's model identifier set.
pub trait EngineLoader: Send + Sync + 'static {
    /// Load the language-understanding model.
    fn load_understanding(&self, models: &LocaleModels) -> Result<Arc<dyn UnderstandingEngine>>;

    /// Load the speech-synthesis model.
    fn load_synthesis(&self, models: &LocaleModels) -> Result<Arc<dyn SynthesisEngine>>;
}

/// Completion record for the bundle: which sub-model loads succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BundleStatus {
    pub understanding_ok: bool,
    pub synthesis_ok: bool,
}

impl BundleStatus {
    /// Both models loaded successfully.
    pub fn all_loaded(&self) -> bool {
        self.understanding_ok && self.synthesis_ok
    }
}

enum LoadCompletion {
    Understanding(Result<Arc<dyn UnderstandingEngine>>),
    Synthesis(Result<Arc<dyn SynthesisEngine>>),
}

#[derive(Default)]
struct LoadedEngines {
    understanding: Option<Arc<dyn UnderstandingEngine>>,
    synthesis: Option<Arc<dyn SynthesisEngine>>,
}

/// Holder of the two long-lived model capabilities.
///
/// Created once at startup and owned by the controller that created it;
/// mutated only by the two load completions.
pub struct ModelBundle {
    locale: Locale,
    engines: Arc<Mutex<LoadedEngines>>,
    status: Arc<Mutex<Option<BundleStatus>>>,
    ready_rx: Mutex<Option<Receiver<BundleStatus>>>,
}

impl ModelBundle {
    /// Start both model loads concurrently for the given locale.
    pub fn initialize(loader: Arc<dyn EngineLoader>, locale: Locale) -> Self {
        let models = locale.models();
        info!(%locale, "initializing model bundle");

        let engines = Arc::new(Mutex::new(LoadedEngines::default()));
        let status = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(2);

        {
            let loader = Arc::clone(&loader);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let result = loader.load_understanding(&models);
                let _ = done_tx.send(LoadCompletion::Understanding(result));
            });
        }

        thread::spawn(move || {
            let result = loader.load_synthesis(&models);
            let _ = done_tx.send(LoadCompletion::Synthesis(result));
        });

        {
            let engines = Arc::clone(&engines);
            let status = Arc::clone(&status);
            thread::spawn(move || {
                let mut completed = BundleStatus::default();
                for _ in 0..2 {
                    match done_rx.recv() {
                        Ok(LoadCompletion::Understanding(Ok(engine))) => {
                            info!("understanding model loaded");
                            engines.lock().understanding = Some(engine);
                            completed.understanding_ok = true;
                        }
                        Ok(LoadCompletion::Understanding(Err(e))) => {
                            error!(error = %e, "understanding model failed to load");
                        }
                        Ok(LoadCompletion::Synthesis(Ok(engine))) => {
                            info!("synthesis model loaded");
                            engines.lock().synthesis = Some(engine);
                            completed.synthesis_ok = true;
                        }
                        Ok(LoadCompletion::Synthesis(Err(e))) => {
                            error!(error = %e, "synthesis model failed to load");
                        }
                        Err(_) => break,
                    }
                }

                info!(?completed, "model bundle ready");
                *status.lock() = Some(completed);
                let _ = ready_tx.send(completed);
            });
        }

        Self {
            locale,
            engines,
            status,
            ready_rx: Mutex::new(Some(ready_rx)),
        }
    }

    /// The locale this bundle was initialized for.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Register the ready callback.
    ///
    /// Fires exactly once, after both loads have completed. Only one
    /// registration (or receiver claim) is allowed per bundle.
    pub fn on_ready<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(BundleStatus) + Send + 'static,
    {
        let rx = self.claim_ready_receiver()?;
        thread::spawn(move || {
            if let Ok(status) = rx.recv() {
                callback(status);
            }
        });
        Ok(())
    }

    /// Claim the single ready-signal receiver.
    pub fn claim_ready_receiver(&self) -> Result<Receiver<BundleStatus>> {
        self.ready_rx
            .lock()
            .take()
            .ok_or_else(|| TellerError::Channel("ready signal already claimed".into()))
    }

    /// Block until the bundle is ready, up to the given timeout.
    pub fn wait_ready(&self, timeout: Duration) -> Result<BundleStatus> {
        if let Some(status) = self.status() {
            return Ok(status);
        }
        let rx = self.claim_ready_receiver()?;
        rx.recv_timeout(timeout)
            .map_err(|_| TellerError::NotReady)
    }

    /// Completion status, once both loads have finished.
    pub fn status(&self) -> Option<BundleStatus> {
        *self.status.lock()
    }

    /// The loaded understanding engine, if its load succeeded.
    pub fn understanding(&self) -> Option<Arc<dyn UnderstandingEngine>> {
        self.engines.lock().understanding.clone()
    }

    /// The loaded synthesis engine, if its load succeeded.
    pub fn synthesis(&self) -> Option<Arc<dyn SynthesisEngine>> {
        self.engines.lock().synthesis.clone()
    }
}
