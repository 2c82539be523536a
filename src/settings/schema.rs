//! Settings schema
//!
//! Every field has a default so a partial (or missing) settings file still
//! yields a usable configuration.

use crate::export::types::FourCc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub recording: RecordingSettings,
    pub screen: ScreenSettings,
}

/// Capture and output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingSettings {
    /// Directory under which the dated folders are created
    pub output_root: PathBuf,

    /// Target frame rate of every written video
    pub fps: u32,

    /// Sessions end on their own after this many seconds
    pub max_duration_secs: u64,

    pub codec: FourCc,

    /// Container extension, without the dot
    pub extension: String,

    pub camera_index: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            fps: 20,
            max_duration_secs: 600,
            codec: FourCc::XVID,
            extension: "avi".to_string(),
            camera_index: 0,
        }
    }
}

impl RecordingSettings {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

/// Screen grab options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenSettings {
    /// Grab-device input, e.g. `:0.0` on X11; platform default when unset
    pub display: Option<String>,
}
