//! Decoded video frames
//!
//! A [`Frame`] is immutable once built. The pipeline passes frames around as
//! `Arc<Frame>` so the relay, the render consumer and the surface can all hold
//! the same buffer without copying it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};

/// Pixel layouts accepted by the transform stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit BGRA (the usual camera capture layout)
    Bgra8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit RGB, no alpha
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Byte offsets of the red, green and blue channels within one pixel
    #[inline]
    pub fn rgb_offsets(&self) -> [usize; 3] {
        match self {
            PixelFormat::Bgra8 => [2, 1, 0],
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => [0, 1, 2],
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Rgb8 => "rgb8",
        }
    }
}

/// Width/height pair shared by frames and surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Single decoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Presentation timestamp relative to the start of the source
    timestamp: Duration,
    /// Monotonic sequence number assigned by the source
    sequence: u64,
}

impl Frame {
    /// Build a frame, checking the buffer length against the declared layout.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: Duration,
        sequence: u64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GradeError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                width, height
            )));
        }

        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(GradeError::InvalidFrame(format!(
                "{}x{} {} needs {} bytes, got {}",
                width,
                height,
                format.as_str(),
                expected,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            format,
            timestamp,
            sequence,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Same metadata, new pixel data. Used by the transform stage, which never
    /// changes the layout.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            width: self.width,
            height: self.height,
            format: self.format,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_length() {
        let err = Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Bgra8, Duration::ZERO, 0);
        assert!(matches!(err, Err(GradeError::InvalidFrame(_))));
    }

    #[test]
    fn test_frame_rejects_zero_size() {
        let err = Frame::new(Vec::new(), 0, 4, PixelFormat::Rgb8, Duration::ZERO, 0);
        assert!(matches!(err, Err(GradeError::InvalidFrame(_))));
    }

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(vec![0u8; 2 * 3 * 3], 2, 3, PixelFormat::Rgb8, Duration::ZERO, 7).unwrap();
        assert_eq!(frame.row_bytes(), 6);
        assert_eq!(frame.extent(), Extent::new(2, 3));
        assert_eq!(frame.sequence(), 7);
    }

    #[test]
    fn test_bgra_channel_offsets() {
        assert_eq!(PixelFormat::Bgra8.rgb_offsets(), [2, 1, 0]);
        assert_eq!(PixelFormat::Rgba8.rgb_offsets(), [0, 1, 2]);
    }
}
