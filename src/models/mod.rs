//! Long-lived model capabilities
//!
//! The understanding and synthesis models are loaded concurrently at startup
//! and exposed behind a single ready signal.

pub mod bundle;

pub use bundle::{BundleStatus, EngineLoader, ModelBundle};
