//! Test doubles for capture devices, media files and export
//!
//! [`RawMedia`] writes an uncompressed container to disk so file existence
//! and size checks behave as they would with real encodes.

use crate::capture::frame::{FrameBuffer, PixelOrder, Resolution};
use crate::capture::traits::{
    CaptureError, CaptureResult, CaptureSource, ScreenProvider, ScreenSource,
};
use crate::export::dispatch::{ExportDispatcher, UploadOutcome};
use crate::export::types::{
    check_frame, FrameSink, MediaError, ReaderFactory, SinkFactory, VideoReader, VideoSpec,
};
use crate::settings::CredentialSet;
use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MAGIC: &[u8; 4] = b"RAWV";
const HEADER_LEN: usize = 16;

fn order_byte(order: PixelOrder) -> u8 {
    match order {
        PixelOrder::Rgb => 0,
        PixelOrder::Bgr => 1,
    }
}

fn header(resolution: Resolution, fps: u32) -> Vec<u8> {
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&resolution.width.to_le_bytes());
    bytes.extend_from_slice(&resolution.height.to_le_bytes());
    bytes.extend_from_slice(&fps.to_le_bytes());
    bytes
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn parse(bytes: &[u8]) -> Result<(Resolution, u32, Vec<FrameBuffer>), MediaError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(MediaError::Decoding("not a raw video file".to_string()));
    }
    let resolution = Resolution::new(read_u32(bytes, 4), read_u32(bytes, 8));
    let fps = read_u32(bytes, 12);

    let record = 1 + resolution.frame_size();
    let body = &bytes[HEADER_LEN..];
    if body.len() % record != 0 {
        return Err(MediaError::Decoding("truncated frame".to_string()));
    }

    let mut frames = Vec::new();
    for chunk in body.chunks(record) {
        let order = if chunk[0] == 0 { PixelOrder::Rgb } else { PixelOrder::Bgr };
        frames.push(FrameBuffer::from_raw(resolution, order, chunk[1..].to_vec())?);
    }
    Ok((resolution, fps, frames))
}

#[derive(Default)]
struct RawState {
    fail_reads_after: HashMap<PathBuf, usize>,
    fail_sinks: bool,
}

/// Media backend over an uncompressed on-disk format
#[derive(Default)]
pub(crate) struct RawMedia {
    state: Mutex<RawState>,
    sinks_opened: AtomicUsize,
    readers_opened: AtomicUsize,
}

impl RawMedia {
    /// Write a finished video; an empty frame list produces an 8x8 stream
    pub fn insert(&self, path: &Path, frames: Vec<FrameBuffer>) {
        let resolution = frames
            .first()
            .map(|f| f.resolution())
            .unwrap_or(Resolution::new(8, 8));
        let mut bytes = header(resolution, 20);
        for frame in &frames {
            bytes.push(order_byte(frame.order()));
            bytes.extend_from_slice(frame.as_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    /// Frames stored at `path`, or `None` when it is missing or malformed
    pub fn frames(&self, path: &Path) -> Option<Vec<FrameBuffer>> {
        let bytes = std::fs::read(path).ok()?;
        parse(&bytes).ok().map(|(_, _, frames)| frames)
    }

    /// Readers over `path` fail with a decoding error after `count` frames
    pub fn fail_reads_after(&self, path: &Path, count: usize) {
        self.state
            .lock()
            .fail_reads_after
            .insert(path.to_path_buf(), count);
    }

    /// Every sink opened from now on rejects frames
    pub fn fail_sinks(&self) {
        self.state.lock().fail_sinks = true;
    }

    pub fn sinks_opened(&self) -> usize {
        self.sinks_opened.load(Ordering::SeqCst)
    }

    pub fn readers_opened(&self) -> usize {
        self.readers_opened.load(Ordering::SeqCst)
    }
}

impl SinkFactory for RawMedia {
    fn open_sink(&self, path: &Path, spec: &VideoSpec) -> Result<Box<dyn FrameSink>, MediaError> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&header(spec.resolution, spec.fps))?;
        self.sinks_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RawSink {
            path: path.to_path_buf(),
            spec: *spec,
            file,
            frames: 0,
            fail: self.state.lock().fail_sinks,
        }))
    }
}

impl ReaderFactory for RawMedia {
    fn open_reader(&self, path: &Path) -> Result<Box<dyn VideoReader>, MediaError> {
        let bytes = std::fs::read(path)?;
        let (resolution, fps, frames) = parse(&bytes)?;
        self.readers_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RawReader {
            resolution,
            fps,
            frames: frames.into(),
            fail_after: self.state.lock().fail_reads_after.get(path).copied(),
            read: 0,
        }))
    }
}

struct RawSink {
    path: PathBuf,
    spec: VideoSpec,
    file: BufWriter<File>,
    frames: u64,
    fail: bool,
}

impl FrameSink for RawSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), MediaError> {
        if self.fail {
            return Err(MediaError::Encoding("disk full".to_string()));
        }
        check_frame(&self.spec, frame)?;
        self.file.write_all(&[order_byte(frame.order())])?;
        self.file.write_all(frame.as_bytes())?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf, MediaError> {
        self.file.flush()?;
        Ok(self.path)
    }
}

struct RawReader {
    resolution: Resolution,
    fps: u32,
    frames: VecDeque<FrameBuffer>,
    fail_after: Option<usize>,
    read: usize,
}

impl VideoReader for RawReader {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn fps(&self) -> f64 {
        self.fps as f64
    }

    fn read_frame(&mut self) -> Result<Option<FrameBuffer>, MediaError> {
        if self.fail_after.is_some_and(|limit| self.read >= limit) {
            return Err(MediaError::Decoding("corrupt packet".to_string()));
        }
        self.read += 1;
        Ok(self.frames.pop_front())
    }
}

/// One scripted camera read
pub(crate) enum CameraStep {
    Frame(FrameBuffer),
    Fail(String),
}

#[derive(Default)]
struct GateState {
    exhausted: bool,
    released: bool,
}

#[derive(Default)]
struct GateInner {
    state: Mutex<GateState>,
    cvar: Condvar,
}

/// Observes and unblocks a [`ScriptedCamera`] that ran out of steps
#[derive(Clone)]
pub(crate) struct CameraGate(Arc<GateInner>);

impl CameraGate {
    /// Block until the camera has served its whole script
    pub fn wait_exhausted(&self) {
        let mut state = self.0.state.lock();
        while !state.exhausted {
            let timed_out = self
                .0
                .cvar
                .wait_for(&mut state, Duration::from_secs(5))
                .timed_out();
            assert!(!timed_out, "camera script was never exhausted");
        }
    }

    /// Let the pending read return an error
    pub fn release(&self) {
        self.0.state.lock().released = true;
        self.0.cvar.notify_all();
    }
}

/// Camera replaying a fixed script, then blocking like an idle device
pub(crate) struct ScriptedCamera {
    resolution: Resolution,
    steps: VecDeque<CameraStep>,
    gate: Arc<GateInner>,
}

impl ScriptedCamera {
    pub fn with_steps(resolution: Resolution, steps: Vec<CameraStep>) -> (Self, CameraGate) {
        let gate = Arc::new(GateInner::default());
        let camera = Self {
            resolution,
            steps: steps.into(),
            gate: gate.clone(),
        };
        (camera, CameraGate(gate))
    }

    /// `count` RGB frames whose pixels hold their index
    pub fn frames(resolution: Resolution, count: usize) -> (Self, CameraGate) {
        let steps = (0..count)
            .map(|i| {
                let v = i as u8;
                CameraStep::Frame(FrameBuffer::filled(resolution, PixelOrder::Rgb, [v, v, v]))
            })
            .collect();
        Self::with_steps(resolution, steps)
    }
}

impl CaptureSource for ScriptedCamera {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read_frame(&mut self) -> CaptureResult<FrameBuffer> {
        match self.steps.pop_front() {
            Some(CameraStep::Frame(frame)) => Ok(frame),
            Some(CameraStep::Fail(reason)) => Err(CaptureError::ReadFailed(reason)),
            None => {
                let mut state = self.gate.state.lock();
                state.exhausted = true;
                self.gate.cvar.notify_all();
                while !state.released {
                    self.gate.cvar.wait(&mut state);
                }
                Err(CaptureError::ReadFailed("device closed".to_string()))
            }
        }
    }
}

/// Screen yielding solid RGB frames, optionally failing after a few
pub(crate) struct ScriptedScreen {
    resolution: Resolution,
    fail_after: Option<usize>,
    taken: usize,
}

impl ScreenSource for ScriptedScreen {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn snapshot(&mut self) -> CaptureResult<FrameBuffer> {
        if self.fail_after.is_some_and(|limit| self.taken >= limit) {
            return Err(CaptureError::ReadFailed("display went away".to_string()));
        }
        self.taken += 1;
        Ok(FrameBuffer::filled(self.resolution, PixelOrder::Rgb, [10, 20, 30]))
    }
}

pub(crate) struct ScriptedScreenProvider {
    resolution: Resolution,
    fail_open: bool,
    fail_after: Option<usize>,
    opened: AtomicUsize,
}

impl ScriptedScreenProvider {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            fail_open: false,
            fail_after: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(resolution: Resolution) -> Self {
        Self {
            fail_open: true,
            ..Self::new(resolution)
        }
    }

    pub fn failing_after(resolution: Resolution, snapshots: usize) -> Self {
        Self {
            fail_after: Some(snapshots),
            ..Self::new(resolution)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ScreenProvider for ScriptedScreenProvider {
    fn open_screen(&self, _fps: u32) -> CaptureResult<Box<dyn ScreenSource>> {
        if self.fail_open {
            return Err(CaptureError::DeviceUnavailable("no display".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedScreen {
            resolution: self.resolution,
            fail_after: self.fail_after,
            taken: 0,
        }))
    }
}

/// Dispatcher that only records what it was handed
#[derive(Default)]
pub(crate) struct CountingDispatcher {
    calls: Mutex<Vec<(PathBuf, CredentialSet)>>,
}

impl CountingDispatcher {
    pub fn calls(&self) -> Vec<(PathBuf, CredentialSet)> {
        self.calls.lock().clone()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.calls.lock().iter().map(|(path, _)| path.clone()).collect()
    }
}

#[async_trait]
impl ExportDispatcher for CountingDispatcher {
    async fn dispatch(&self, file: &Path, credentials: &CredentialSet) -> Vec<UploadOutcome> {
        self.calls
            .lock()
            .push((file.to_path_buf(), credentials.clone()));
        Vec::new()
    }
}
