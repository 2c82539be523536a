//! `cameras` and `system` commands

use super::Context;
use crate::capture::get_cameras;
use crate::export::FfmpegBackend;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub ffmpeg_available: bool,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let ffmpeg_available = match FfmpegBackend::default().check_available() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        };
        Self {
            os: std::env::consts::OS.to_string(),
            os_version: get_os_version(),
            arch: std::env::consts::ARCH.to_string(),
            ffmpeg_available,
        }
    }
}

/// Print the cameras the capture backend can see
pub fn cameras() -> Result<()> {
    let cameras = get_cameras();
    if cameras.is_empty() {
        println!("No cameras found");
    }
    for camera in cameras {
        println!("[{}] {} ({})", camera.id, camera.name, camera.description);
    }
    Ok(())
}

pub fn system_info(ctx: &Context) -> Result<()> {
    let info = SystemInfo::collect();
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("Settings: {}", ctx.settings_path.display());
    println!("Credentials: {}", ctx.credentials_path().display());
    println!(
        "Output root: {}",
        ctx.settings.recording.output_root.display()
    );
    Ok(())
}

fn get_os_version() -> String {
    #[cfg(target_os = "macos")]
    let output = std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output();

    #[cfg(target_os = "windows")]
    let output = std::process::Command::new("cmd").args(["/C", "ver"]).output();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let output = std::process::Command::new("uname").arg("-r").output();

    output
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}
