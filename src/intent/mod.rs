//! Recognition data model and intent dispatch
//!
//! This module provides:
//! - The typed entity/result model produced by the understanding engine
//! - The `IntentRouter` that maps a recognized intent to a handler

pub mod router;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TellerError;

pub use router::IntentRouter;

/// Intent emitted when the caller asks for their account balance.
pub const INTENT_ACCOUNT_BALANCE: &str = "accountBalance";
/// Intent emitted when the caller asks to be connected to someone.
pub const INTENT_CALL: &str = "call";
/// Intent emitted when the caller asks for an appointment.
pub const INTENT_NEW_CALENDAR_EVENT: &str = "newCalendarEvent";

/// A named slot extracted from an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EntityValue {
    /// Free-text slot (e.g. who to call).
    Text(String),
    /// Point in time (e.g. when an appointment starts).
    Timestamp(DateTime<Utc>),
    /// Numeric slot.
    Number(f64),
}

impl EntityValue {
    /// The text payload, if this is a text slot.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntityValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The timestamp payload, if this is a time slot.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            EntityValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// The numeric payload, if this is a number slot.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EntityValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One completed recognition: a classified intent plus its extracted slots.
///
/// Produced at most once per session by the understanding engine and handed
/// to the router for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// The classified purpose of the utterance.
    pub intent: String,
    /// Extracted entities, keyed by slot name.
    #[serde(default)]
    pub entities: HashMap<String, EntityValue>,
}

impl RecognitionResult {
    /// Create a result with no entities.
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            entities: HashMap::new(),
        }
    }

    /// Attach an entity.
    pub fn with_entity(mut self, name: impl Into<String>, value: EntityValue) -> Self {
        self.entities.insert(name.into(), value);
        self
    }

    /// Look up an entity by slot name.
    pub fn entity(&self, name: &str) -> Option<&EntityValue> {
        self.entities.get(name)
    }

    /// Look up a text entity by slot name.
    pub fn entity_text(&self, name: &str) -> Option<&str> {
        self.entity(name).and_then(EntityValue::as_text)
    }

    /// Look up a time entity by slot name.
    pub fn entity_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.entity(name).and_then(EntityValue::as_timestamp)
    }

    /// Parse a result from an engine's JSON payload.
    pub fn from_json(payload: &str) -> crate::Result<Self> {
        serde_json::from_str(payload).map_err(|e| TellerError::ModelLoad(e.to_string()))
    }
}

/// What a handler reports after acting on a recognition result.
///
/// Dispatch is total: every input, including internal handler failures,
/// resolves to one of these, so the controller can always proceed.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// The handler produced a spoken response.
    Spoken(String),
    /// The handler acted without speaking (e.g. a call was placed).
    Silent,
    /// The handler could not act; the controller maps this to a re-prompt.
    Failed(TellerError),
}

impl HandlerOutcome {
    /// The spoken text, if any.
    pub fn spoken_text(&self) -> Option<&str> {
        match self {
            HandlerOutcome::Spoken(text) => Some(text),
            _ => None,
        }
    }
}
