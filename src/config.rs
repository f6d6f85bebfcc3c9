//! Configuration for the voice-interaction core
//!
//! Provides centralized configuration for the session controller and the
//! static locale-to-model-identifier selection.

use std::time::Duration;

use crate::{Result, TellerError};

/// Supported interaction locales.
///
/// Selection is static configuration: it picks one of two fixed model
/// identifier sets at initialization time and is never mutated afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    /// Primary locale (hr_HR).
    #[default]
    Croatian,
    /// Fallback locale (en_US).
    English,
}

impl Locale {
    /// BCP 47-ish identifier for this locale.
    pub fn identifier(&self) -> &'static str {
        match self {
            Locale::Croatian => "hr_HR",
            Locale::English => "en_US",
        }
    }

    /// The model identifier set for this locale.
    pub fn models(&self) -> LocaleModels {
        match self {
            Locale::Croatian => LocaleModels {
                understanding_model: "bank-nlu-hr_HR",
                synthesis_voice: "tts-hr_HR-petra",
            },
            Locale::English => LocaleModels {
                understanding_model: "bank-nlu-en_US",
                synthesis_voice: "tts-en_US-amy",
            },
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Identifiers of the two long-lived models backing one locale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocaleModels {
    /// Language-understanding model identifier.
    pub understanding_model: &'static str,
    /// Speech-synthesis voice identifier.
    pub synthesis_voice: &'static str,
}

/// Configuration for the complete interaction core.
#[derive(Clone, Debug)]
pub struct TellerConfig {
    /// Interaction locale (selects the model identifier set).
    pub locale: Locale,

    /// Phone number dialed when the caller asks for their banker.
    pub banker_number: String,

    /// Phone number dialed for everything else.
    pub call_center_number: String,

    /// Upper bound on waiting for the next captured audio frame.
    ///
    /// When it expires the capture is treated as finished and recognition
    /// runs on whatever audio was gathered, so a stalled capture stream
    /// cannot wedge the session in processing.
    pub recognition_timeout: Duration,

    /// Channel buffer size for commands and events.
    pub channel_buffer_size: usize,
}

impl Default for TellerConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            banker_number: "091123456".to_string(),
            call_center_number: "0919876543".to_string(),
            recognition_timeout: Duration::from_secs(30),
            channel_buffer_size: 100,
        }
    }
}

impl TellerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Set the banker phone number.
    pub fn with_banker_number(mut self, number: impl Into<String>) -> Self {
        self.banker_number = number.into();
        self
    }

    /// Set the call-center phone number.
    pub fn with_call_center_number(mut self, number: impl Into<String>) -> Self {
        self.call_center_number = number.into();
        self
    }

    /// Set the bounded wait on capture frames.
    pub fn with_recognition_timeout(mut self, timeout: Duration) -> Self {
        self.recognition_timeout = timeout;
        self
    }

    /// Set the channel buffer size.
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.banker_number.is_empty() {
            return Err(TellerError::Config("banker number is required".into()));
        }
        if self.call_center_number.is_empty() {
            return Err(TellerError::Config("call-center number is required".into()));
        }
        if self.recognition_timeout.is_zero() {
            return Err(TellerError::Config(
                "recognition timeout must be non-zero".into(),
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(TellerError::Config(
                "channel buffer size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
