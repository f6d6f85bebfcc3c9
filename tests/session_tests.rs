//! End-to-end session tests over fake engines
//!
//! Drives the full listen → understand → dispatch → speak cycle with
//! deterministic collaborators and asserts the observable outcomes.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use teller::config::{LocaleModels, TellerConfig};
use teller::engines::{
    AccountState, AudioCapture, CalendarAccess, CalendarStore, Dialer, SynthesisEngine,
    UnderstandingEngine,
};
use teller::intent::{
    EntityValue, RecognitionResult, INTENT_ACCOUNT_BALANCE, INTENT_CALL,
    INTENT_NEW_CALENDAR_EVENT,
};
use teller::models::{EngineLoader, ModelBundle};
use teller::session::{ControllerEvent, ControllerState, SessionController};
use teller::TellerError;

struct ScriptedCapture {
    frame_tx: Mutex<Option<Sender<Vec<f32>>>>,
}

impl ScriptedCapture {
    fn new() -> Self {
        Self {
            frame_tx: Mutex::new(None),
        }
    }

    fn push_frame(&self, frame: Vec<f32>) {
        if let Some(tx) = self.frame_tx.lock().as_ref() {
            tx.send(frame).unwrap();
        }
    }
}

impl AudioCapture for ScriptedCapture {
    fn start_streaming(&self) -> teller::Result<Receiver<Vec<f32>>> {
        let (tx, rx) = bounded(100);
        *self.frame_tx.lock() = Some(tx);
        Ok(rx)
    }

    fn finalize(&self) {
        self.frame_tx.lock().take();
    }
}

/// Understanding fake whose next result is set per session.
struct ScriptedUnderstanding {
    next: Mutex<Option<RecognitionResult>>,
}

impl UnderstandingEngine for ScriptedUnderstanding {
    fn recognize(&self, _audio: &[f32]) -> Option<RecognitionResult> {
        self.next.lock().clone()
    }
}

struct RecordingSynthesis {
    spoken: Mutex<Vec<String>>,
}

impl SynthesisEngine for RecordingSynthesis {
    fn speak(&self, text: &str) -> teller::Result<()> {
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDialer {
    calls: Mutex<Vec<String>>,
}

impl Dialer for RecordingDialer {
    fn place_call(&self, number: &str) {
        self.calls.lock().push(number.to_string());
    }
}

struct FakeCalendar {
    access: Mutex<CalendarAccess>,
    events: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>, String)>>,
}

impl CalendarStore for FakeCalendar {
    fn authorization_status(&self) -> CalendarAccess {
        *self.access.lock()
    }

    fn create_event(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title: &str,
    ) -> teller::Result<()> {
        self.events.lock().push((start, end, title.to_string()));
        Ok(())
    }
}

struct FixedBalance(&'static str);

impl AccountState for FixedBalance {
    fn current_balance(&self) -> String {
        self.0.to_string()
    }
}

/// Loader that hands out the harness's pre-built fakes.
struct FakeLoader {
    understanding: Arc<ScriptedUnderstanding>,
    synthesis: Arc<RecordingSynthesis>,
}

impl EngineLoader for FakeLoader {
    fn load_understanding(
        &self,
        _models: &LocaleModels,
    ) -> teller::Result<Arc<dyn UnderstandingEngine>> {
        Ok(Arc::clone(&self.understanding) as _)
    }

    fn load_synthesis(&self, _models: &LocaleModels) -> teller::Result<Arc<dyn SynthesisEngine>> {
        Ok(Arc::clone(&self.synthesis) as _)
    }
}

struct Harness {
    controller: SessionController,
    capture: Arc<ScriptedCapture>,
    understanding: Arc<ScriptedUnderstanding>,
    synthesis: Arc<RecordingSynthesis>,
    dialer: Arc<RecordingDialer>,
    calendar: Arc<FakeCalendar>,
    events: Receiver<ControllerEvent>,
    _worker: JoinHandle<()>,
}

fn harness() -> Harness {
    let understanding = Arc::new(ScriptedUnderstanding {
        next: Mutex::new(None),
    });
    let synthesis = Arc::new(RecordingSynthesis {
        spoken: Mutex::new(Vec::new()),
    });
    let capture = Arc::new(ScriptedCapture::new());
    let dialer = Arc::new(RecordingDialer::default());
    let calendar = Arc::new(FakeCalendar {
        access: Mutex::new(CalendarAccess::Authorized),
        events: Mutex::new(Vec::new()),
    });

    let config = TellerConfig::default().with_recognition_timeout(Duration::from_secs(5));
    let bundle = ModelBundle::initialize(
        Arc::new(FakeLoader {
            understanding: Arc::clone(&understanding),
            synthesis: Arc::clone(&synthesis),
        }),
        config.locale,
    );

    let (controller, worker) = SessionController::new(
        config,
        bundle,
        Arc::clone(&capture) as _,
        Arc::clone(&calendar) as _,
        Arc::clone(&dialer) as _,
        Arc::new(FixedBalance("23.45")),
    )
    .unwrap();
    let worker = worker.start();
    let events = controller.event_receiver();

    // Wait until the models are ready and listening is enabled.
    loop {
        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            ControllerEvent::Ready(status) => {
                assert!(status.all_loaded());
                break;
            }
            _ => continue,
        }
    }
    assert!(controller.state().is_idle());

    Harness {
        controller,
        capture,
        understanding,
        synthesis,
        dialer,
        calendar,
        events,
        _worker: worker,
    }
}

impl Harness {
    /// Run one full session with the given scripted recognition result,
    /// returning once the controller is idle again.
    fn run_session(&self, result: Option<RecognitionResult>) {
        *self.understanding.next.lock() = result;
        self.controller.start_listening().unwrap();
        self.capture.push_frame(vec![0.0; 160]);
        self.controller.stop_listening().unwrap();
        self.wait_for_idle();
    }

    fn wait_for_idle(&self) {
        loop {
            match self.events.recv_timeout(Duration::from_secs(5)).unwrap() {
                ControllerEvent::StateChanged(ControllerState::Idle) => break,
                _ => continue,
            }
        }
        assert!(self.controller.state().is_idle());
    }

    fn spoken(&self) -> Vec<String> {
        self.synthesis.spoken.lock().clone()
    }
}

#[test]
fn account_balance_is_spoken() {
    let h = harness();
    h.run_session(Some(RecognitionResult::new(INTENT_ACCOUNT_BALANCE)));
    assert_eq!(h.spoken(), ["On your account, you have 23.45 EUR"]);
}

#[test]
fn no_match_reprompts() {
    let h = harness();
    h.run_session(None);
    assert_eq!(h.spoken(), ["Could you please repeat."]);
}

#[test]
fn unknown_intent_reprompts() {
    let h = harness();
    h.run_session(Some(RecognitionResult::new("orderPizza")));
    assert_eq!(h.spoken(), ["Could you please repeat."]);
}

#[test]
fn call_banker_dials_silently() {
    let h = harness();
    h.run_session(Some(
        RecognitionResult::new(INTENT_CALL)
            .with_entity("who", EntityValue::Text("banker".into())),
    ));

    assert_eq!(*h.dialer.calls.lock(), ["091123456"]);
    // Silent outcome: the session returns to idle without speaking.
    assert!(h.spoken().is_empty());
}

#[test]
fn call_without_who_is_recovered_into_reprompt() {
    let h = harness();
    h.run_session(Some(RecognitionResult::new(INTENT_CALL)));

    assert!(h.dialer.calls.lock().is_empty());
    assert_eq!(h.spoken(), ["Could you please repeat."]);
}

#[test]
fn calendar_event_created_and_confirmed() {
    let h = harness();
    let when = Utc.with_ymd_and_hms(2026, 9, 1, 9, 30, 0).unwrap();
    h.run_session(Some(
        RecognitionResult::new(INTENT_NEW_CALENDAR_EVENT)
            .with_entity("when", EntityValue::Timestamp(when)),
    ));

    assert_eq!(h.spoken(), ["Appointment added."]);
    let events = h.calendar.events.lock();
    assert_eq!(events.len(), 1);
    let (start, end, title) = &events[0];
    assert_eq!(*start, when);
    assert_eq!((*end - *start).num_seconds(), 3600);
    assert_eq!(title, "Meeting");
}

#[test]
fn calendar_without_when_falls_through_to_reprompt() {
    let h = harness();
    h.run_session(Some(RecognitionResult::new(INTENT_NEW_CALENDAR_EVENT)));

    assert!(h.calendar.events.lock().is_empty());
    assert_eq!(h.spoken(), ["Could you please repeat."]);
}

#[test]
fn calendar_denied_access_is_explained() {
    let h = harness();
    *h.calendar.access.lock() = CalendarAccess::Denied;
    let when = Utc.with_ymd_and_hms(2026, 9, 1, 9, 30, 0).unwrap();
    h.run_session(Some(
        RecognitionResult::new(INTENT_NEW_CALENDAR_EVENT)
            .with_entity("when", EntityValue::Timestamp(when)),
    ));

    assert!(h.calendar.events.lock().is_empty());
    assert_eq!(
        h.spoken(),
        ["This feature requires access rights for calendar events. Please grant access."]
    );
}

#[test]
fn overlapping_sessions_are_refused() {
    let h = harness();
    *h.understanding.next.lock() = Some(RecognitionResult::new(INTENT_ACCOUNT_BALANCE));

    h.controller.start_listening().unwrap();
    let err = h.controller.start_listening().unwrap_err();
    assert!(matches!(err, TellerError::InvalidState { expected: "Idle", .. }));

    h.capture.push_frame(vec![0.0; 160]);
    h.controller.stop_listening().unwrap();
    h.wait_for_idle();

    // Once idle again, a new session is accepted.
    h.controller.start_listening().unwrap();
    h.controller.stop_listening().unwrap();
    h.wait_for_idle();
}

#[test]
fn stop_when_not_listening_is_invalid_and_harmless() {
    let h = harness();
    let err = h.controller.stop_listening().unwrap_err();
    assert!(matches!(
        err,
        TellerError::InvalidState {
            expected: "Listening",
            ..
        }
    ));
    assert!(h.controller.state().is_idle());
}

#[test]
fn sequential_sessions_each_reach_idle() {
    let h = harness();
    h.run_session(Some(RecognitionResult::new(INTENT_ACCOUNT_BALANCE)));
    h.run_session(None);
    h.run_session(Some(
        RecognitionResult::new(INTENT_CALL)
            .with_entity("who", EntityValue::Text("my banker please".into())),
    ));

    assert_eq!(
        h.spoken(),
        [
            "On your account, you have 23.45 EUR",
            "Could you please repeat."
        ]
    );
    assert_eq!(*h.dialer.calls.lock(), ["091123456"]);
}

#[test]
fn direct_speak_passthrough() {
    let h = harness();
    h.controller.speak("One moment please.", false).unwrap();

    // Drain until the utterance shows up; direct speech bypasses the
    // session cycle entirely.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while h.spoken().is_empty() {
        assert!(std::time::Instant::now() < deadline, "utterance never played");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(h.spoken(), ["One moment please."]);
    assert!(h.controller.state().is_idle());
}

#[test]
fn listening_is_disabled_until_models_load() {
    struct StalledLoader;

    impl EngineLoader for StalledLoader {
        fn load_understanding(
            &self,
            _models: &LocaleModels,
        ) -> teller::Result<Arc<dyn UnderstandingEngine>> {
            std::thread::sleep(Duration::from_millis(200));
            Err(TellerError::ModelLoad("nlu unavailable".into()))
        }

        fn load_synthesis(
            &self,
            _models: &LocaleModels,
        ) -> teller::Result<Arc<dyn SynthesisEngine>> {
            Ok(Arc::new(RecordingSynthesis {
                spoken: Mutex::new(Vec::new()),
            }))
        }
    }

    let config = TellerConfig::default();
    let bundle = ModelBundle::initialize(Arc::new(StalledLoader), config.locale);
    let (controller, worker) = SessionController::new(
        config,
        bundle,
        Arc::new(ScriptedCapture::new()),
        Arc::new(FakeCalendar {
            access: Mutex::new(CalendarAccess::Unknown),
            events: Mutex::new(Vec::new()),
        }),
        Arc::new(RecordingDialer::default()),
        Arc::new(FixedBalance("0.00")),
    )
    .unwrap();
    let _worker = worker.start();
    let events = controller.event_receiver();

    // Not ready yet.
    assert!(matches!(
        controller.start_listening().unwrap_err(),
        TellerError::NotReady
    ));

    // A failed sub-load completes the bundle but keeps listening disabled.
    loop {
        match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            ControllerEvent::Error(message) => {
                assert!(message.contains("understanding_ok=false"));
                break;
            }
            _ => continue,
        }
    }
    assert_eq!(controller.state(), ControllerState::AwaitingModels);
    assert!(matches!(
        controller.start_listening().unwrap_err(),
        TellerError::NotReady
    ));

    controller.shutdown().unwrap();
}
