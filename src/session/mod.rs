//! Session control
//!
//! The state machine behind the control surface: start and stop recording,
//! then composite and export what was recorded.

pub mod controller;

pub use controller::{FinalizeReport, SessionController, SessionEvent, SessionState};
