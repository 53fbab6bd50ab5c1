//! Camera subsystem module

pub mod audio;
pub mod capture;
pub mod device;
pub mod frame;
pub mod latest;
pub mod manager;

pub use capture::CameraWorker;
pub use device::{open_source, DeviceBackend, FrameSource, Platform, SlotConfig};
pub use frame::{CapturedImage, PixelLayout, SharedFrame, VideoFrame};
pub use latest::LatestFrame;
pub use manager::{CameraManager, CameraSettings, SlotStatus};
