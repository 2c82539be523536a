//! Recording system module
//!
//! A [`Recorder`] owns the camera for the life of the process and runs one
//! capture session at a time on a background worker thread. Each session
//! writes a camera file and, optionally, a screen file in lockstep.

pub mod coordinator;
pub mod state;
mod worker;

pub use coordinator::{Recorder, RecordingEvent};
pub use state::{EndReason, RecorderConfig, RecordingOutcome, RecordingState, Session};

use crate::export::types::MediaError;
use std::path::PathBuf;
use thiserror::Error;

/// Recording errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to read camera frame: {0}")]
    FrameRead(String),

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to write camera file: {0}")]
    SinkFailed(String),

    #[error("Capture worker panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;
