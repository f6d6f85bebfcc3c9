//! Intent routing with a fixed handler table
//!
//! Maps a recognized intent name plus entities to one of the side-effecting
//! handlers: account-balance lookup, phone dialing, calendar-event creation,
//! or the fallback re-prompt.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::engines::{AccountState, CalendarAccess, CalendarStore, Dialer};
use crate::intent::{
    HandlerOutcome, RecognitionResult, INTENT_ACCOUNT_BALANCE, INTENT_CALL,
    INTENT_NEW_CALENDAR_EVENT,
};
use crate::TellerError;

/// Generic re-prompt, spoken whenever nothing actionable was understood.
pub const REPROMPT: &str = "Could you please repeat.";
/// Confirmation after a calendar event was persisted.
pub const APPOINTMENT_ADDED: &str = "Appointment added.";
/// Spoken when calendar write access has not been granted.
pub const CALENDAR_ACCESS_REQUIRED: &str =
    "This feature requires access rights for calendar events. Please grant access.";
/// Title given to every created appointment.
pub const EVENT_TITLE: &str = "Meeting";

/// Routes recognition results to the fixed set of intent handlers.
///
/// Dispatch never propagates an error past its boundary: every path,
/// including handler failures, resolves to a [`HandlerOutcome`].
pub struct IntentRouter {
    account: Arc<dyn AccountState>,
    dialer: Arc<dyn Dialer>,
    calendar: Arc<dyn CalendarStore>,
    banker_number: String,
    call_center_number: String,
}

impl IntentRouter {
    /// Create a router over the external collaborators.
    pub fn new(
        account: Arc<dyn AccountState>,
        dialer: Arc<dyn Dialer>,
        calendar: Arc<dyn CalendarStore>,
        banker_number: impl Into<String>,
        call_center_number: impl Into<String>,
    ) -> Self {
        Self {
            account,
            dialer,
            calendar,
            banker_number: banker_number.into(),
            call_center_number: call_center_number.into(),
        }
    }

    /// Dispatch one recognition result (or the no-match signal) to its handler.
    pub fn dispatch(&self, result: Option<RecognitionResult>) -> HandlerOutcome {
        let result = match result {
            Some(result) => result,
            None => {
                debug!("no recognition match, re-prompting");
                return HandlerOutcome::Spoken(REPROMPT.to_string());
            }
        };

        debug!(intent = %result.intent, "dispatching intent");

        match result.intent.as_str() {
            INTENT_ACCOUNT_BALANCE => self.handle_account_balance(),
            INTENT_CALL => self.handle_call(&result),
            INTENT_NEW_CALENDAR_EVENT => self.handle_new_calendar_event(&result),
            other => {
                debug!(intent = other, "unknown intent, re-prompting");
                HandlerOutcome::Spoken(REPROMPT.to_string())
            }
        }
    }

    fn handle_account_balance(&self) -> HandlerOutcome {
        let balance = self.account.current_balance();
        HandlerOutcome::Spoken(format!("On your account, you have {} EUR", balance))
    }

    fn handle_call(&self, result: &RecognitionResult) -> HandlerOutcome {
        let who = match result.entity_text("who") {
            Some(who) => who,
            None => {
                warn!("call intent without a usable 'who' entity");
                return HandlerOutcome::Failed(TellerError::MissingEntity("who"));
            }
        };

        let number = if who.contains("banker") {
            &self.banker_number
        } else {
            &self.call_center_number
        };

        info!(who, %number, "placing call");
        self.dialer.place_call(number);
        HandlerOutcome::Silent
    }

    fn handle_new_calendar_event(&self, result: &RecognitionResult) -> HandlerOutcome {
        match self.calendar.authorization_status() {
            CalendarAccess::Authorized => {}
            status => {
                info!(?status, "not authorized for calendar events");
                return HandlerOutcome::Spoken(CALENDAR_ACCESS_REQUIRED.to_string());
            }
        }

        // A missing 'when' takes the same re-prompt path as an unrecognized
        // intent, not a missing-entity failure. Kept as-is.
        let when = match result.entity_timestamp("when") {
            Some(when) => when,
            None => {
                warn!("calendar intent without a usable 'when' entity, re-prompting");
                return HandlerOutcome::Spoken(REPROMPT.to_string());
            }
        };

        let end = when + Duration::hours(1);
        match self.calendar.create_event(when, end, EVENT_TITLE) {
            Ok(()) => {
                info!(start = %when, "appointment added");
                HandlerOutcome::Spoken(APPOINTMENT_ADDED.to_string())
            }
            Err(e) => {
                warn!(error = %e, "calendar persistence failed");
                HandlerOutcome::Spoken(e.to_string())
            }
        }
    }
}
