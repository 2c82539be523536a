//! FFmpeg encoder and decoder wrappers
//!
//! Encoders receive raw `bgr24` frames on stdin; decoders are probed with
//! ffprobe and stream raw `bgr24` frames on stdout. [`FfmpegBackend`] hands
//! both out through the [`SinkFactory`] and [`ReaderFactory`] traits.

use crate::capture::frame::{FrameBuffer, Resolution};
use crate::export::types::{
    check_frame, FrameSink, MediaError, ReaderFactory, SinkFactory, VideoReader, VideoSpec,
    SINK_PIXEL_ORDER,
};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// FFmpeg-backed media backend
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegBackend {
    /// Check that both ffmpeg and ffprobe can be launched
    pub fn check_available(&self) -> Result<(), MediaError> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|e| {
                    MediaError::Ffmpeg(format!(
                        "{} not found ({e}). Please install FFmpeg",
                        tool.display()
                    ))
                })?;
        }
        Ok(())
    }
}

impl SinkFactory for FfmpegBackend {
    fn open_sink(&self, path: &Path, spec: &VideoSpec) -> Result<Box<dyn FrameSink>, MediaError> {
        Ok(Box::new(VideoEncoder::spawn(&self.ffmpeg, path, spec)?))
    }
}

impl ReaderFactory for FfmpegBackend {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, MediaError> {
        Ok(Box::new(VideoDecoder::open(&self.ffmpeg, &self.ffprobe, path)?))
    }
}

/// Video decoder using FFmpeg to read frames from a video file
pub struct VideoDecoder {
    process: Child,
    stdout: BufReader<ChildStdout>,
    resolution: Resolution,
    fps: f64,
    frames_read: u64,
}

impl VideoDecoder {
    /// Open a video file for decoding
    pub fn open(ffmpeg: &Path, ffprobe: &Path, video_path: &Path) -> Result<Self, MediaError> {
        if !video_path.is_file() {
            return Err(MediaError::Decoding(format!(
                "{} does not exist",
                video_path.display()
            )));
        }

        let (resolution, fps) = probe_video(ffprobe, video_path)?;

        tracing::info!(
            "Opening video decoder for {:?}: {} @ {}fps",
            video_path,
            resolution,
            fps
        );

        let mut process = Command::new(ffmpeg)
            .args(["-loglevel", "error", "-i"])
            .arg(video_path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                SINK_PIXEL_ORDER.ffmpeg_pix_fmt(),
                "-s",
                &resolution.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to start FFmpeg decoder: {e}")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| MediaError::Ffmpeg("Failed to capture FFmpeg stdout".to_string()))?;

        Ok(Self {
            process,
            stdout: BufReader::with_capacity(resolution.frame_size() * 2, stdout),
            resolution,
            fps,
            frames_read: 0,
        })
    }

    /// Get number of frames read so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl VideoReader for VideoDecoder {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn read_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError> {
        let mut buffer = vec![0u8; self.resolution.frame_size()];

        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(Some(FrameBuffer::from_raw(
                    self.resolution,
                    SINK_PIXEL_ORDER,
                    buffer,
                )?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(MediaError::Decoding(format!("Failed to read frame: {e}"))),
        }
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Probe a video file for its resolution and frame rate
fn probe_video(ffprobe: &Path, video_path: &Path) -> Result<(Resolution, f64), MediaError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "csv=p=0",
        ])
        .arg(video_path)
        .output()
        .map_err(|e| MediaError::Ffmpeg(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Ffmpeg(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(stdout: &str) -> Result<(Resolution, f64), MediaError> {
    let line = stdout.lines().next().unwrap_or("").trim();
    let parts: Vec<&str> = line.split(',').collect();

    if parts.len() < 3 {
        return Err(MediaError::Ffmpeg(format!("Unexpected ffprobe output: {line:?}")));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| MediaError::Ffmpeg("Invalid width".to_string()))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| MediaError::Ffmpeg("Invalid height".to_string()))?;

    // Frame rate comes as "20/1" or "30000/1001"
    let fps = match parts[2].split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => parts[2].parse().unwrap_or(0.0),
    };

    Ok((Resolution::new(width, height), fps))
}

/// Video encoder feeding raw frames to an FFmpeg process
pub struct VideoEncoder {
    process: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    spec: VideoSpec,
    frame_count: u64,
}

impl VideoEncoder {
    /// Start an FFmpeg process encoding to `path`
    pub fn spawn(ffmpeg: &Path, path: &Path, spec: &VideoSpec) -> Result<Self, MediaError> {
        let codec_args = spec.codec.encoder_args()?;

        let mut args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            SINK_PIXEL_ORDER.ffmpeg_pix_fmt().to_string(),
            "-s".to_string(),
            spec.resolution.to_string(),
            "-r".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
        ];
        args.extend(codec_args);
        args.push(path.to_string_lossy().to_string());

        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to start FFmpeg encoder: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MediaError::Ffmpeg("Failed to capture FFmpeg stdin".to_string()))?;

        Ok(Self {
            process,
            stdin: Some(stdin),
            path: path.to_path_buf(),
            spec: *spec,
            frame_count: 0,
        })
    }
}

impl FrameSink for VideoEncoder {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), MediaError> {
        check_frame(&self.spec, frame)?;
        let frame_bytes = if frame.order() == SINK_PIXEL_ORDER {
            std::borrow::Cow::Borrowed(frame.as_bytes())
        } else {
            std::borrow::Cow::Owned(frame.clone().into_order(SINK_PIXEL_ORDER).into_bytes())
        };

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::Encoding("encoder already closed".to_string()))?;
        stdin
            .write_all(&frame_bytes)
            .map_err(|e| MediaError::Encoding(format!("Failed to write frame: {e}")))?;
        self.frame_count += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frame_count
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf, MediaError> {
        // Close stdin to signal EOF to FFmpeg
        drop(self.stdin.take());

        let status = self
            .process
            .wait()
            .map_err(|e| MediaError::Ffmpeg(format!("Failed to wait for FFmpeg: {e}")))?;

        let mut stderr = String::new();
        if let Some(mut pipe) = self.process.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }

        if !status.success() {
            if self.frame_count == 0 {
                // FFmpeg refuses to mux an empty stream; leave an empty file behind
                tracing::warn!(
                    "FFmpeg produced no output for empty stream {:?}: {}",
                    self.path,
                    stderr.trim()
                );
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
            } else {
                return Err(MediaError::Ffmpeg(format!(
                    "FFmpeg exited with {status}: {}",
                    stderr.trim()
                )));
            }
        }

        tracing::info!(
            "FFmpeg encoder finished: {} frames written to {:?}",
            self.frame_count,
            self.path
        );
        Ok(self.path.clone())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        // Only reached without finish() on error paths; don't leave FFmpeg running
        if self.stdin.take().is_some() {
            let _ = self.process.kill();
            let _ = self.process.wait();
        }
    }
}
