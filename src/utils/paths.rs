//! Output path naming
//!
//! Recordings land in a date hierarchy under the output root:
//! `<year>/<month#>_<monthName>/<day#>_<weekday>/<HHhMM_SS><suffix>.<ext>`.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Marker inserted before the extension of composite outputs
pub const COMBINED_MARKER: &str = "_combined";

/// Suffix of the screen recording next to a camera file
pub const SCREEN_SUFFIX: &str = "_screen";

/// Derives recording directories and file names from timestamps
#[derive(Debug, Clone)]
pub struct PathNamer {
    root: PathBuf,
    extension: String,
}

impl PathNamer {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Relative directory for a timestamp, e.g. `2024/03_March/05_Tuesday`
    pub fn directory_for(now: &NaiveDateTime) -> PathBuf {
        let mut dir = PathBuf::from(now.format("%Y").to_string());
        dir.push(now.format("%m_%B").to_string());
        dir.push(now.format("%d_%A").to_string());
        dir
    }

    /// File name for a timestamp, e.g. `14h05_09_screen.avi`
    pub fn filename_for(&self, now: &NaiveDateTime, suffix: &str) -> String {
        format!("{}{}.{}", now.format("%Hh%M_%S"), suffix, self.extension)
    }

    /// Create `root/directory_for(now)` if needed and return it
    pub fn ensure_directory(&self, now: &NaiveDateTime) -> std::io::Result<PathBuf> {
        let dir = self.root.join(Self::directory_for(now));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Insert the combined marker before the extension of `primary`
pub fn combined_path(primary: &Path) -> PathBuf {
    let stem = primary
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match primary.extension() {
        Some(ext) => format!("{stem}{COMBINED_MARKER}.{}", ext.to_string_lossy()),
        None => format!("{stem}{COMBINED_MARKER}"),
    };
    primary.with_file_name(name)
}
