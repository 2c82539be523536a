//! Screen capture through an FFmpeg grab device
//!
//! FFmpeg streams raw `rgb24` frames of the whole desktop on stdout. A reader
//! thread keeps only the most recent frame, so a snapshot always reflects
//! the screen at the moment it is taken instead of a queued backlog.

use super::frame::{FrameBuffer, PixelOrder, Resolution};
use super::traits::{CaptureError, CaptureResult, ScreenProvider, ScreenSource};
use crate::settings::ScreenSettings;
use parking_lot::{Condvar, Mutex};
use std::io::{BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// How long a snapshot waits for the grabber to deliver its first frame
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Grab-device input arguments for the current platform
pub fn grab_input_args(settings: &ScreenSettings, fps: u32) -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        let display = settings
            .display
            .clone()
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_else(|| ":0.0".to_string());
        vec![
            "-f".to_string(),
            "x11grab".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            display,
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            "-f".to_string(),
            "gdigrab".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            settings.display.clone().unwrap_or_else(|| "desktop".to_string()),
        ]
    }

    #[cfg(target_os = "macos")]
    {
        // avfoundation lists screens after cameras; "1" is the first screen on most machines
        let screen = settings.display.clone().unwrap_or_else(|| "1".to_string());
        vec![
            "-f".to_string(),
            "avfoundation".to_string(),
            "-capture_cursor".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-i".to_string(),
            format!("{screen}:none"),
        ]
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let _ = fps;
        vec![
            "-i".to_string(),
            settings.display.clone().unwrap_or_default(),
        ]
    }
}

/// Detect the screen resolution by probing the grab device
pub fn detect_resolution(input_args: &[String]) -> CaptureResult<Resolution> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(input_args)
        .args([
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ])
        .output()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(CaptureError::DeviceUnavailable(format!(
            "ffprobe could not open the screen: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_dimensions(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_dimensions(stdout: &str) -> CaptureResult<Resolution> {
    let line = stdout.lines().next().unwrap_or("").trim();
    let mut parts = line.split(',');
    let width = parts.next().and_then(|w| w.trim().parse::<u32>().ok());
    let height = parts.next().and_then(|h| h.trim().parse::<u32>().ok());

    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok(Resolution::new(w, h)),
        _ => Err(CaptureError::DeviceUnavailable(format!(
            "Unexpected ffprobe output: {line:?}"
        ))),
    }
}

#[derive(Default)]
struct LatestFrame {
    frame: Option<FrameBuffer>,
    closed: bool,
}

/// Screen source backed by a long-running FFmpeg grab process
pub struct FfmpegScreenSource {
    process: Child,
    resolution: Resolution,
    latest: Arc<(Mutex<LatestFrame>, Condvar)>,
    reader_thread: Option<JoinHandle<()>>,
}

impl FfmpegScreenSource {
    /// Start grabbing the screen described by `settings` at `fps`
    pub fn open(settings: &ScreenSettings, fps: u32) -> CaptureResult<Self> {
        let input_args = grab_input_args(settings, fps);
        let resolution = detect_resolution(&input_args)?;

        let mut process = Command::new("ffmpeg")
            .args(["-loglevel", "error"])
            .args(&input_args)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                PixelOrder::Rgb.ffmpeg_pix_fmt(),
                "-s",
                &resolution.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CaptureError::DeviceUnavailable(format!("Failed to start FFmpeg grabber: {e}")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| CaptureError::DeviceUnavailable("Failed to capture FFmpeg stdout".to_string()))?;

        let latest = Arc::new((Mutex::new(LatestFrame::default()), Condvar::new()));
        let slot = latest.clone();
        let frame_size = resolution.frame_size();

        let reader_thread = std::thread::Builder::new()
            .name("screen-grabber".to_string())
            .spawn(move || {
                let mut reader = BufReader::with_capacity(frame_size * 2, stdout);
                loop {
                    let mut buffer = vec![0u8; frame_size];
                    if reader.read_exact(&mut buffer).is_err() {
                        break;
                    }
                    let Ok(frame) = FrameBuffer::from_raw(resolution, PixelOrder::Rgb, buffer) else {
                        break;
                    };
                    let (lock, cvar) = &*slot;
                    lock.lock().frame = Some(frame);
                    cvar.notify_all();
                }
                let (lock, cvar) = &*slot;
                lock.lock().closed = true;
                cvar.notify_all();
                tracing::debug!("Screen grabber reader stopped");
            })?;

        tracing::info!("Screen capture started at {} @ {}fps", resolution, fps);

        Ok(Self {
            process,
            resolution,
            latest,
            reader_thread: Some(reader_thread),
        })
    }
}

impl ScreenSource for FfmpegScreenSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn snapshot(&mut self) -> CaptureResult<FrameBuffer> {
        let (lock, cvar) = &*self.latest;
        let mut latest = lock.lock();

        while latest.frame.is_none() && !latest.closed {
            if cvar.wait_for(&mut latest, FIRST_FRAME_TIMEOUT).timed_out() {
                return Err(CaptureError::ReadFailed(
                    "screen grabber produced no frame".to_string(),
                ));
            }
        }

        if latest.closed {
            return Err(CaptureError::ReadFailed("screen grabber exited".to_string()));
        }

        latest
            .frame
            .clone()
            .ok_or_else(|| CaptureError::ReadFailed("screen grabber produced no frame".to_string()))
    }
}

/// Starts an FFmpeg grabber per session using the configured display
#[derive(Debug, Clone, Default)]
pub struct FfmpegScreenProvider {
    settings: ScreenSettings,
}

impl FfmpegScreenProvider {
    pub fn new(settings: ScreenSettings) -> Self {
        Self { settings }
    }
}

impl ScreenProvider for FfmpegScreenProvider {
    fn open_screen(&self, fps: u32) -> CaptureResult<Box<dyn ScreenSource>> {
        Ok(Box::new(FfmpegScreenSource::open(&self.settings, fps)?))
    }
}

impl Drop for FfmpegScreenSource {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}
