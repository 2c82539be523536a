//! Error types and handling
//!
//! Common error types used across the application, and the plain-text
//! representation handed to the control surface.

use crate::capture::CaptureError;
use crate::export::ExportError;
use crate::recorder::RecordingError;
use crate::settings::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Could not read a camera frame: {0}")]
    FrameRead(String),

    #[error("Cannot read {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Video file not found for export: {}", .0.display())]
    ExportAborted(PathBuf),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<RecordingError> for AppError {
    fn from(error: RecordingError) -> Self {
        match error {
            RecordingError::AlreadyRecording => AppError::AlreadyRecording,
            RecordingError::DeviceUnavailable(msg) => AppError::DeviceUnavailable(msg),
            RecordingError::FrameRead(msg) => AppError::FrameRead(msg),
            RecordingError::Io(e) => AppError::Io(e),
            other => AppError::Recording(other.to_string()),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(error: ExportError) -> Self {
        match error {
            ExportError::SourceUnreadable { path, reason } => {
                AppError::SourceUnreadable { path, reason }
            }
            ExportError::Io(e) => AppError::Io(e),
            other => AppError::Export(other.to_string()),
        }
    }
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::DeviceUnavailable(msg) => AppError::DeviceUnavailable(msg),
            CaptureError::ReadFailed(msg) => AppError::FrameRead(msg),
            CaptureError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(error: SettingsError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            AppError::AlreadyRecording => "ALREADY_RECORDING",
            AppError::FrameRead(_) => "FRAME_READ_ERROR",
            AppError::SourceUnreadable { .. } => "SOURCE_UNREADABLE",
            AppError::ExportAborted(_) => "EXPORT_ABORTED",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Export(_) => "EXPORT_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Error message as shown by the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
