//! Session orchestration
//!
//! Ties capture completion to intent dispatch to spoken feedback, enforcing
//! the overall interaction state machine.

pub mod controller;

pub use controller::{ControllerEvent, ControllerState, SessionController, SessionWorker};
