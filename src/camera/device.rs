//! Capture backends and frame sources
//!
//! Backend selection is resolved once when a worker is constructed,
//! never per frame. The synthetic test-pattern source is always
//! compiled in; real device backends sit behind feature gates.

use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::camera::frame::{CapturedImage, PixelLayout};
use crate::error::CaptureError;

/// Device specs with this prefix select the synthetic source.
/// `test:fail` yields a source whose reads always fail.
pub const TEST_DEVICE_PREFIX: &str = "test:";

/// Capture backends a slot can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceBackend {
    /// Resolve to the platform default at construction
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "v4l2")]
    V4l2,
    #[serde(rename = "dshow")]
    DirectShow,
    #[serde(rename = "msmf")]
    MediaFoundation,
}

impl DeviceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceBackend::Auto => "auto",
            DeviceBackend::V4l2 => "v4l2",
            DeviceBackend::DirectShow => "dshow",
            DeviceBackend::MediaFoundation => "msmf",
        }
    }

    /// Map `Auto` to the platform default; concrete backends pass through
    pub fn resolve(self, platform: Platform) -> DeviceBackend {
        match self {
            DeviceBackend::Auto => default_backend(platform),
            concrete => concrete,
        }
    }
}

impl fmt::Display for DeviceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DeviceBackend::Auto),
            "v4l2" => Ok(DeviceBackend::V4l2),
            "dshow" => Ok(DeviceBackend::DirectShow),
            "msmf" => Ok(DeviceBackend::MediaFoundation),
            other => Err(format!(
                "unknown backend '{}' (expected auto, v4l2, dshow or msmf)",
                other
            )),
        }
    }
}

/// Host platform classes that matter for backend choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// Platform default backend. Pure mapping, no device probing.
pub fn default_backend(platform: Platform) -> DeviceBackend {
    match platform {
        Platform::Linux => DeviceBackend::V4l2,
        Platform::Windows => DeviceBackend::DirectShow,
        Platform::Other => DeviceBackend::Auto,
    }
}

/// Candidate order the probe binary walks for a platform
pub fn probe_order(platform: Platform) -> &'static [DeviceBackend] {
    match platform {
        Platform::Linux => &[DeviceBackend::V4l2],
        Platform::Windows => &[DeviceBackend::DirectShow, DeviceBackend::MediaFoundation],
        Platform::Other => &[],
    }
}

/// Per-slot capture configuration, resolved from the node config
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// Slot index, doubles as the wire camera id
    pub slot: u8,

    /// Device spec: numeric index, device node path, or `test:` pattern
    pub device: String,

    pub backend: DeviceBackend,
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Capture mic audio alongside this slot
    pub audio: bool,
}

/// A blocking frame source for one camera slot
///
/// `read_frame` paces the caller at the device rate. Dropping a source
/// releases the underlying device handle.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> std::result::Result<CapturedImage, CaptureError>;

    /// Dimensions the device actually delivers (may differ from requested)
    fn dimensions(&self) -> (u32, u32);
}

/// Open the source a slot config names
///
/// `test:` specs select the synthetic pattern regardless of backend.
/// Real backends must be compiled in and supported on this platform.
pub fn open_source(config: &SlotConfig) -> std::result::Result<Box<dyn FrameSource>, CaptureError> {
    if config.device.starts_with(TEST_DEVICE_PREFIX) {
        return Ok(Box::new(TestPatternSource::open(config)?));
    }

    let backend = config.backend.resolve(Platform::current());
    match backend {
        #[cfg(feature = "v4l2")]
        DeviceBackend::V4l2 => Ok(Box::new(V4l2Source::open(config)?)),
        other => Err(CaptureError::BackendUnavailable(other.to_string())),
    }
}

/// Synthetic moving-gradient source, self-paced at the configured fps
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_count: u64,
    fail_reads: bool,
}

impl TestPatternSource {
    pub fn open(config: &SlotConfig) -> std::result::Result<Self, CaptureError> {
        let pattern = config
            .device
            .strip_prefix(TEST_DEVICE_PREFIX)
            .unwrap_or(&config.device);
        let fps = config.fps.max(1);

        Ok(Self {
            width: config.width,
            height: config.height,
            frame_interval: Duration::from_micros(1_000_000 / fps as u64),
            frame_count: 0,
            fail_reads: pattern == "fail",
        })
    }

    fn render(&self) -> Vec<u8> {
        let width = self.width as u64;
        let mut pixels = vec![0u8; (self.width * self.height * 3) as usize];
        let tick = self.frame_count;
        for y in 0..self.height as u64 {
            for x in 0..width {
                let i = ((y * width + x) * 3) as usize;
                pixels[i] = ((x + tick * 2) % 256) as u8;
                pixels[i + 1] = ((y + tick) % 256) as u8;
                pixels[i + 2] = ((x + y + tick * 3) % 256) as u8;
            }
        }
        pixels
    }
}

impl FrameSource for TestPatternSource {
    fn read_frame(&mut self) -> std::result::Result<CapturedImage, CaptureError> {
        if self.fail_reads {
            return Err(CaptureError::ReadFailed(
                "test pattern configured to fail".to_string(),
            ));
        }

        thread::sleep(self.frame_interval);
        self.frame_count += 1;

        Ok(CapturedImage {
            data: Bytes::from(self.render()),
            width: self.width,
            height: self.height,
            layout: PixelLayout::Rgb24,
        })
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;

#[cfg(feature = "v4l2")]
mod v4l2 {
    //! Real device capture over V4L2 with an mmap buffer stream.

    use bytes::Bytes;
    use ouroboros::self_referencing;
    use tracing::{info, warn};

    use super::{FrameSource, SlotConfig};
    use crate::camera::frame::{CapturedImage, PixelLayout};
    use crate::error::CaptureError;

    /// V4L2 device source bound to a local device node
    pub struct V4l2Source {
        state: CaptureState,
        width: u32,
        height: u32,
        layout: PixelLayout,
    }

    #[self_referencing]
    struct CaptureState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl V4l2Source {
        pub fn open(config: &SlotConfig) -> std::result::Result<Self, CaptureError> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let path = device_node(&config.device);
            let open_err = |reason: String| CaptureError::OpenFailed {
                device: path.clone(),
                reason,
            };

            let device =
                v4l::Device::with_path(&path).map_err(|e| open_err(e.to_string()))?;

            let mut format = device.format().map_err(|e| open_err(e.to_string()))?;
            format.width = config.width;
            format.height = config.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    warn!(device = %path, error = %err, "failed to set format, keeping current");
                    device.format().map_err(|e| open_err(e.to_string()))?
                }
            };

            let layout = match &format.fourcc.repr {
                b"RGB3" => PixelLayout::Rgb24,
                b"BGR3" => PixelLayout::Bgr24,
                b"GREY" => PixelLayout::Luma8,
                other => {
                    return Err(CaptureError::UnsupportedFormat(format!(
                        "fourcc {}",
                        String::from_utf8_lossy(other)
                    )))
                }
            };

            if config.fps > 0 {
                let params = v4l::video::capture::Parameters::with_fps(config.fps);
                if let Err(err) = device.set_params(&params) {
                    warn!(device = %path, error = %err, "failed to set frame rate");
                }
            }

            let state = CaptureStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                },
            }
            .try_build()
            .map_err(|e| open_err(e.to_string()))?;

            info!(
                device = %path,
                width = format.width,
                height = format.height,
                "opened v4l2 device"
            );

            Ok(Self {
                state,
                width: format.width,
                height: format.height,
                layout,
            })
        }
    }

    impl FrameSource for V4l2Source {
        fn read_frame(&mut self) -> std::result::Result<CapturedImage, CaptureError> {
            use v4l::io::traits::CaptureStream;

            let (buf, _meta) = self
                .state
                .with_mut(|fields| fields.stream.next())
                .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;

            Ok(CapturedImage {
                data: Bytes::copy_from_slice(buf),
                width: self.width,
                height: self.height,
                layout: self.layout,
            })
        }

        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }
    }

    /// Accept both bare indices ("0") and full device node paths
    fn device_node(spec: &str) -> String {
        if !spec.is_empty() && spec.chars().all(|c| c.is_ascii_digit()) {
            format!("/dev/video{}", spec)
        } else {
            spec.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_slot(device: &str) -> SlotConfig {
        SlotConfig {
            slot: 0,
            device: device.to_string(),
            backend: DeviceBackend::Auto,
            width: 32,
            height: 16,
            fps: 500,
            audio: false,
        }
    }

    #[test]
    fn test_default_backend_is_pure() {
        assert_eq!(default_backend(Platform::Linux), DeviceBackend::V4l2);
        assert_eq!(default_backend(Platform::Windows), DeviceBackend::DirectShow);
        assert_eq!(default_backend(Platform::Other), DeviceBackend::Auto);
        // Same input, same output.
        assert_eq!(
            default_backend(Platform::Linux),
            default_backend(Platform::Linux)
        );
    }

    #[test]
    fn test_resolve_maps_auto_only() {
        assert_eq!(
            DeviceBackend::Auto.resolve(Platform::Linux),
            DeviceBackend::V4l2
        );
        assert_eq!(
            DeviceBackend::MediaFoundation.resolve(Platform::Linux),
            DeviceBackend::MediaFoundation
        );
    }

    #[test]
    fn test_backend_from_str_round_trip() {
        for name in ["auto", "v4l2", "dshow", "msmf"] {
            let backend: DeviceBackend = name.parse().unwrap();
            assert_eq!(backend.to_string(), name);
        }
        assert!("opencv".parse::<DeviceBackend>().is_err());
    }

    #[test]
    fn test_probe_order_per_platform() {
        assert_eq!(probe_order(Platform::Linux), &[DeviceBackend::V4l2]);
        assert_eq!(
            probe_order(Platform::Windows),
            &[DeviceBackend::DirectShow, DeviceBackend::MediaFoundation]
        );
        assert!(probe_order(Platform::Other).is_empty());
    }

    #[test]
    fn test_pattern_source_produces_frames() {
        let mut source = TestPatternSource::open(&test_slot("test:gradient")).unwrap();
        let first = source.read_frame().unwrap();
        let second = source.read_frame().unwrap();

        assert_eq!(first.width, 32);
        assert_eq!(first.height, 16);
        assert_eq!(first.data.len(), first.expected_len());
        // The pattern moves between frames.
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_pattern_source_fail_mode() {
        let mut source = TestPatternSource::open(&test_slot("test:fail")).unwrap();
        assert!(source.read_frame().is_err());
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_open_source_rejects_missing_backend() {
        let mut config = test_slot("0");
        config.backend = DeviceBackend::MediaFoundation;
        match open_source(&config) {
            Err(CaptureError::BackendUnavailable(name)) => assert_eq!(name, "msmf"),
            other => panic!("expected BackendUnavailable, got {:?}", other.map(|_| ())),
        }
    }
}
