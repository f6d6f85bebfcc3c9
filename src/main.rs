use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teller::config::{LocaleModels, TellerConfig};
use teller::engines::{
    AccountState, AudioCapture, CalendarAccess, CalendarStore, Dialer, SynthesisEngine,
    UnderstandingEngine,
};
use teller::intent::{RecognitionResult, INTENT_ACCOUNT_BALANCE};
use teller::models::{EngineLoader, ModelBundle};
use teller::session::{ControllerEvent, SessionController};

/// Capture stub backed by a channel; frames are pushed from this process.
struct DemoCapture {
    frame_tx: Mutex<Option<Sender<Vec<f32>>>>,
}

impl AudioCapture for DemoCapture {
    fn start_streaming(&self) -> teller::Result<Receiver<Vec<f32>>> {
        let (tx, rx) = bounded(100);
        *self.frame_tx.lock() = Some(tx);
        Ok(rx)
    }

    fn finalize(&self) {
        self.frame_tx.lock().take();
    }
}

/// Understanding stub that always hears a balance request.
struct DemoUnderstanding;

impl UnderstandingEngine for DemoUnderstanding {
    fn recognize(&self, _audio: &[f32]) -> Option<RecognitionResult> {
        Some(RecognitionResult::new(INTENT_ACCOUNT_BALANCE))
    }
}

/// Synthesis stub that prints instead of speaking.
struct ConsoleSynthesis;

impl SynthesisEngine for ConsoleSynthesis {
    fn speak(&self, text: &str) -> teller::Result<()> {
        println!("[voice] {}", text);
        Ok(())
    }
}

struct DemoLoader;

impl EngineLoader for DemoLoader {
    fn load_understanding(
        &self,
        models: &LocaleModels,
    ) -> teller::Result<Arc<dyn UnderstandingEngine>> {
        info!(model = models.understanding_model, "loading understanding model");
        Ok(Arc::new(DemoUnderstanding))
    }

    fn load_synthesis(&self, models: &LocaleModels) -> teller::Result<Arc<dyn SynthesisEngine>> {
        info!(voice = models.synthesis_voice, "loading synthesis voice");
        Ok(Arc::new(ConsoleSynthesis))
    }
}

struct DemoCalendar;

impl CalendarStore for DemoCalendar {
    fn authorization_status(&self) -> CalendarAccess {
        CalendarAccess::Authorized
    }

    fn create_event(
        &self,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
        title: &str,
    ) -> teller::Result<()> {
        info!(%start, title, "event created");
        Ok(())
    }
}

struct PrintDialer;

impl Dialer for PrintDialer {
    fn place_call(&self, number: &str) {
        println!("[dialer] calling {}", number);
    }
}

struct DemoAccount;

impl AccountState for DemoAccount {
    fn current_balance(&self) -> String {
        "23.45".to_string()
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teller=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting teller demo session");

    let config = TellerConfig::default();
    let bundle = ModelBundle::initialize(Arc::new(DemoLoader), config.locale);
    let capture = Arc::new(DemoCapture {
        frame_tx: Mutex::new(None),
    });

    let (controller, worker) = SessionController::new(
        config,
        bundle,
        Arc::clone(&capture) as _,
        Arc::new(DemoCalendar),
        Arc::new(PrintDialer),
        Arc::new(DemoAccount),
    )?;
    let worker_handle = worker.start();

    let events = controller.event_receiver();
    let mut session_started = false;
    loop {
        match events.recv_timeout(Duration::from_secs(10))? {
            ControllerEvent::Ready(status) => {
                info!(?status, "models ready, starting a scripted session");
                controller.start_listening()?;
                session_started = true;
                let frame_tx = capture
                    .frame_tx
                    .lock()
                    .clone()
                    .context("capture stream not started")?;
                frame_tx.send(vec![0.0; 1600])?;
                controller.stop_listening()?;
            }
            ControllerEvent::Recognized(intent) => {
                info!(?intent, "recognized");
            }
            ControllerEvent::StateChanged(state) if state.is_idle() && session_started => {
                info!("session complete, shutting down");
                controller.shutdown()?;
            }
            ControllerEvent::Shutdown => break,
            event => info!(?event, "event"),
        }
    }

    worker_handle.join().ok();
    Ok(())
}
