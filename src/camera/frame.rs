//! Video frame types shared across the pipeline
//!
//! Frames are immutable once captured and travel between stages as
//! `Arc<VideoFrame>`; no stage copies pixel data.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Pixel layouts a capture source can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb24,
    Bgr24,
    Luma8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Rgb24 | PixelLayout::Bgr24 => 3,
            PixelLayout::Luma8 => 1,
        }
    }
}

/// Raw image as produced by a capture source, before slot stamping
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Pixel data, tightly packed rows
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl CapturedImage {
    /// Byte length the declared dimensions and layout require
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}

/// One camera frame: immutable pixels plus capture metadata
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Owning slot index, doubles as the wire camera id
    pub camera_id: u8,

    /// Per-slot sequence number, monotonically increasing
    pub sequence: u64,

    /// Capture time, Unix seconds
    pub timestamp: f64,

    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,

    /// Pixel data, tightly packed rows
    pub data: Bytes,
}

/// Frames are shared between stages without copying
pub type SharedFrame = Arc<VideoFrame>;

impl VideoFrame {
    /// Stamp a captured image with its slot identity and sequence number
    pub fn from_image(camera_id: u8, sequence: u64, timestamp: f64, image: CapturedImage) -> Self {
        Self {
            camera_id,
            sequence,
            timestamp,
            width: image.width,
            height: image.height,
            layout: image.layout,
            data: image.data,
        }
    }

    /// Byte length the frame's dimensions and layout require
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}

/// Current wall-clock time as Unix seconds
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
