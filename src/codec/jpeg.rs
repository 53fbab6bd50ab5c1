//! JPEG frame encoding
//!
//! Wraps the image crate's JPEG encoder with per-frame validation and
//! running statistics for the compression ratio line.

use std::borrow::Cow;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::camera::frame::{PixelLayout, VideoFrame};
use crate::error::CodecError;

/// Encodes frames for the wire
///
/// A trait seam so the transmit loop can run against an injected
/// encoder in tests.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &VideoFrame) -> std::result::Result<Bytes, CodecError>;
}

/// JPEG encoder at a fixed quality
pub struct JpegFrameEncoder {
    quality: u8,
    /// Frames encoded
    frames_encoded: u64,
    /// Raw bytes in
    bytes_in: u64,
    /// Compressed bytes out
    bytes_out: u64,
}

impl JpegFrameEncoder {
    /// Create an encoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            frames_encoded: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    /// Raw-to-compressed size ratio over everything encoded so far
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_out == 0 {
            0.0
        } else {
            self.bytes_in as f64 / self.bytes_out as f64
        }
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&mut self, frame: &VideoFrame) -> std::result::Result<Bytes, CodecError> {
        let expected = frame.expected_len();
        if frame.data.len() != expected {
            return Err(CodecError::BadFrameSize {
                expected,
                actual: frame.data.len(),
            });
        }

        let (pixels, color): (Cow<[u8]>, _) = match frame.layout {
            PixelLayout::Rgb24 => (Cow::Borrowed(frame.data.as_ref()), ExtendedColorType::Rgb8),
            PixelLayout::Bgr24 => (Cow::Owned(bgr_to_rgb(&frame.data)), ExtendedColorType::Rgb8),
            PixelLayout::Luma8 => (Cow::Borrowed(frame.data.as_ref()), ExtendedColorType::L8),
        };

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        encoder
            .encode(&pixels, frame.width, frame.height, color)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_in += frame.data.len() as u64;
        self.bytes_out += out.len() as u64;

        Ok(Bytes::from(out))
    }
}

fn bgr_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = data.to_vec();
    for px in rgb.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(layout: PixelLayout) -> VideoFrame {
        let (width, height) = (32u32, 16u32);
        let bpp = layout.bytes_per_pixel();
        let mut data = vec![0u8; (width * height) as usize * bpp];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }

        VideoFrame {
            camera_id: 0,
            sequence: 0,
            timestamp: 0.0,
            width,
            height,
            layout,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_encodes_valid_jpeg() {
        let mut encoder = JpegFrameEncoder::new(70);
        let jpeg = encoder.encode(&gradient_frame(PixelLayout::Rgb24)).unwrap();

        // JPEG start-of-image and end-of-image markers.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(encoder.frames_encoded(), 1);
    }

    #[test]
    fn test_luma_frames_encode() {
        let mut encoder = JpegFrameEncoder::new(70);
        let jpeg = encoder.encode(&gradient_frame(PixelLayout::Luma8)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_bgr_matches_swapped_rgb() {
        let rgb = gradient_frame(PixelLayout::Rgb24);

        let mut swapped = rgb.data.to_vec();
        for px in swapped.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        let bgr = VideoFrame {
            layout: PixelLayout::Bgr24,
            data: Bytes::from(swapped),
            ..rgb.clone()
        };

        let mut encoder = JpegFrameEncoder::new(70);
        let from_rgb = encoder.encode(&rgb).unwrap();
        let from_bgr = encoder.encode(&bgr).unwrap();
        assert_eq!(from_rgb, from_bgr);
    }

    #[test]
    fn test_rejects_bad_buffer_size() {
        let mut frame = gradient_frame(PixelLayout::Rgb24);
        frame.data = frame.data.slice(..frame.data.len() - 1);

        let mut encoder = JpegFrameEncoder::new(70);
        match encoder.encode(&frame) {
            Err(CodecError::BadFrameSize { expected, actual }) => {
                assert_eq!(expected, actual + 1);
            }
            other => panic!("expected BadFrameSize, got {:?}", other.map(|b| b.len())),
        }
        assert_eq!(encoder.frames_encoded(), 0);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegFrameEncoder::new(0).quality(), 1);
        assert_eq!(JpegFrameEncoder::new(70).quality(), 70);
        assert_eq!(JpegFrameEncoder::new(255).quality(), 100);
    }

    #[test]
    fn test_compression_ratio_tracks() {
        let mut encoder = JpegFrameEncoder::new(70);
        assert_eq!(encoder.compression_ratio(), 0.0);

        encoder.encode(&gradient_frame(PixelLayout::Rgb24)).unwrap();
        assert!(encoder.compression_ratio() > 1.0);
    }
}
