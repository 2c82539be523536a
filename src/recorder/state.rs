//! Recording state management
//!
//! Defines the recorder state machine, the session record, and the outcome
//! handed back when a session ends.

use super::RecordingError;
use crate::export::types::FourCc;
use crate::settings::RecordingSettings;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Capture loop running
    Recording,
    /// Waiting for the capture loop to exit and flush
    Stopping,
}

/// Capture parameters shared by every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    pub fps: u32,
    pub max_duration: Duration,
    pub codec: FourCc,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from(&RecordingSettings::default())
    }
}

impl From<&RecordingSettings> for RecorderConfig {
    fn from(settings: &RecordingSettings) -> Self {
        Self {
            fps: settings.fps,
            max_duration: settings.max_duration(),
            codec: settings.codec,
        }
    }
}

/// One recording session
///
/// The record itself is immutable; its lifecycle state is owned by
/// [`SessionController`](crate::session::SessionController), which drops the
/// session once it has been finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Derived from the start timestamp, e.g. `20240305-140509`
    pub id: String,

    pub start_time: NaiveDateTime,

    pub record_screen: bool,

    pub camera_file: PathBuf,

    /// Set only when a screen sink was actually opened
    pub screen_file: Option<PathBuf>,
}

impl Session {
    pub fn new(
        start_time: NaiveDateTime,
        record_screen: bool,
        camera_file: PathBuf,
        screen_file: Option<PathBuf>,
    ) -> Self {
        Self {
            id: start_time.format("%Y%m%d-%H%M%S").to_string(),
            start_time,
            record_screen,
            camera_file,
            screen_file,
        }
    }

    /// Every file this session writes
    pub fn files(&self) -> Vec<&Path> {
        std::iter::once(self.camera_file.as_path())
            .chain(self.screen_file.as_deref())
            .collect()
    }
}

/// Why a capture loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Stop was requested
    Stopped,
    /// The maximum session duration elapsed
    TimedOut,
    /// The camera failed to deliver a frame
    FrameReadFailed(String),
    /// The camera file could not be written
    SinkFailed(String),
    /// The capture worker panicked
    Panicked,
}

impl EndReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, EndReason::Stopped | EndReason::TimedOut)
    }
}

/// Result of a finished session
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    pub session: Session,
    pub camera_frames: u64,
    /// `None` when the session had no screen sink
    pub screen_frames: Option<u64>,
    pub ended_by: EndReason,
    pub duration: Duration,
}

impl RecordingOutcome {
    pub fn camera_file(&self) -> &Path {
        &self.session.camera_file
    }

    pub fn screen_file(&self) -> Option<&Path> {
        self.session.screen_file.as_deref()
    }

    pub fn files(&self) -> Vec<&Path> {
        self.session.files()
    }

    pub fn ended_cleanly(&self) -> bool {
        self.ended_by.is_clean()
    }

    /// The session failure, if it did not end cleanly
    pub fn error(&self) -> Option<RecordingError> {
        match &self.ended_by {
            EndReason::Stopped | EndReason::TimedOut => None,
            EndReason::FrameReadFailed(msg) => Some(RecordingError::FrameRead(msg.clone())),
            EndReason::SinkFailed(msg) => Some(RecordingError::SinkFailed(msg.clone())),
            EndReason::Panicked => Some(RecordingError::WorkerPanicked),
        }
    }
}
