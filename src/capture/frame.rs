//! Raster frame buffers
//!
//! Every source and sink in the crate exchanges packed 8-bit, 3-channel
//! frames. The channel ordering travels with the frame so that sources can
//! hand out their native layout and sinks convert only when needed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes per pixel for every frame in the pipeline
pub const CHANNELS: usize = 3;

/// Channel ordering of a packed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelOrder {
    Rgb,
    Bgr,
}

impl PixelOrder {
    /// FFmpeg `pix_fmt` name for this ordering
    pub fn ffmpeg_pix_fmt(&self) -> &'static str {
        match self {
            PixelOrder::Rgb => "rgb24",
            PixelOrder::Bgr => "bgr24",
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size in bytes of one packed frame at this resolution
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error raised when raw bytes don't describe a frame of the stated size
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame buffer holds {actual} bytes, expected {expected} for {resolution}")]
pub struct FrameSizeError {
    pub resolution: Resolution,
    pub expected: usize,
    pub actual: usize,
}

/// An in-memory packed frame
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    resolution: Resolution,
    order: PixelOrder,
    data: Vec<u8>,
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("resolution", &self.resolution)
            .field("order", &self.order)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FrameBuffer {
    /// Wrap raw packed pixel data
    pub fn from_raw(
        resolution: Resolution,
        order: PixelOrder,
        data: Vec<u8>,
    ) -> Result<Self, FrameSizeError> {
        let expected = resolution.frame_size();
        if data.len() != expected {
            return Err(FrameSizeError {
                resolution,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            resolution,
            order,
            data,
        })
    }

    /// A frame filled with a single color, given in the frame's own ordering
    pub fn filled(resolution: Resolution, order: PixelOrder, pixel: [u8; 3]) -> Self {
        let count = resolution.width as usize * resolution.height as usize;
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&pixel);
        }
        Self {
            resolution,
            order,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.resolution.width as usize + x as usize) * CHANNELS
    }

    /// Pixel at (x, y) in the frame's ordering
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&pixel);
    }

    /// Reorder channels in place; a no-op when the ordering already matches
    pub fn into_order(mut self, order: PixelOrder) -> Self {
        if self.order != order {
            for px in self.data.chunks_exact_mut(CHANNELS) {
                px.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// Nearest-neighbor resample to the given size
    pub fn resize_nearest(&self, width: u32, height: u32) -> FrameBuffer {
        let src_w = self.resolution.width;
        let src_h = self.resolution.height;
        let mut out = Vec::with_capacity(width as usize * height as usize * CHANNELS);

        for dy in 0..height {
            let sy = ((dy as u64 * src_h as u64) / height.max(1) as u64) as u32;
            let sy = sy.min(src_h.saturating_sub(1));
            for dx in 0..width {
                let sx = ((dx as u64 * src_w as u64) / width.max(1) as u64) as u32;
                let sx = sx.min(src_w.saturating_sub(1));
                let i = self.offset(sx, sy);
                out.extend_from_slice(&self.data[i..i + CHANNELS]);
            }
        }

        FrameBuffer {
            resolution: Resolution::new(width, height),
            order: self.order,
            data: out,
        }
    }

    /// Copy `src` opaquely onto this frame with its top-left corner at (x, y).
    ///
    /// Rows and columns falling outside this frame are clipped.
    pub fn blit(&mut self, src: &FrameBuffer, x: u32, y: u32) {
        let src = if src.order == self.order {
            std::borrow::Cow::Borrowed(src)
        } else {
            std::borrow::Cow::Owned(src.clone().into_order(self.order))
        };

        let copy_w = src.width().min(self.width().saturating_sub(x));
        let copy_h = src.height().min(self.height().saturating_sub(y));
        let row_bytes = copy_w as usize * CHANNELS;

        for row in 0..copy_h {
            let s = src.offset(0, row);
            let d = self.offset(x, y + row);
            self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_wrong_size() {
        let err = FrameBuffer::from_raw(Resolution::new(2, 2), PixelOrder::Rgb, vec![0; 11])
            .unwrap_err();
        assert_eq!(err.expected, 12);
        assert_eq!(err.actual, 11);
    }

    #[test]
    fn test_into_order_swaps_red_and_blue() {
        let frame = FrameBuffer::filled(Resolution::new(2, 1), PixelOrder::Rgb, [10, 20, 30]);
        let bgr = frame.into_order(PixelOrder::Bgr);
        assert_eq!(bgr.order(), PixelOrder::Bgr);
        assert_eq!(bgr.pixel(1, 0), [30, 20, 10]);

        // Same order is untouched
        let again = bgr.clone().into_order(PixelOrder::Bgr);
        assert_eq!(again, bgr);
    }

    #[test]
    fn test_resize_nearest_picks_source_blocks() {
        // 4x2 frame: left half red, right half blue
        let mut frame = FrameBuffer::filled(Resolution::new(4, 2), PixelOrder::Rgb, [255, 0, 0]);
        for y in 0..2 {
            for x in 2..4 {
                frame.set_pixel(x, y, [0, 0, 255]);
            }
        }

        let small = frame.resize_nearest(2, 1);
        assert_eq!(small.resolution(), Resolution::new(2, 1));
        assert_eq!(small.pixel(0, 0), [255, 0, 0]);
        assert_eq!(small.pixel(1, 0), [0, 0, 255]);
    }

    #[test]
    fn test_blit_clips_to_destination() {
        let mut dst = FrameBuffer::filled(Resolution::new(4, 4), PixelOrder::Bgr, [0, 0, 0]);
        let src = FrameBuffer::filled(Resolution::new(3, 3), PixelOrder::Bgr, [9, 9, 9]);
        dst.blit(&src, 2, 2);

        assert_eq!(dst.pixel(1, 1), [0, 0, 0]);
        assert_eq!(dst.pixel(2, 2), [9, 9, 9]);
        assert_eq!(dst.pixel(3, 3), [9, 9, 9]);
    }

    #[test]
    fn test_blit_converts_source_order() {
        let mut dst = FrameBuffer::filled(Resolution::new(1, 1), PixelOrder::Bgr, [0, 0, 0]);
        let src = FrameBuffer::filled(Resolution::new(1, 1), PixelOrder::Rgb, [1, 2, 3]);
        dst.blit(&src, 0, 0);
        assert_eq!(dst.pixel(0, 0), [3, 2, 1]);
    }
}
