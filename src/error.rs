//! Error types for the CCTV edge node

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Camera capture errors. These degrade a single slot, never the process.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device {device}: {reason}")]
    OpenFailed { device: String, reason: String },

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Capture backend not available in this build: {0}")]
    BackendUnavailable(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Frame buffer is {actual} bytes, expected {expected}")]
    BadFrameSize { expected: usize, actual: usize },
}

/// Wire protocol errors (parse side)
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Bad packet magic")]
    BadMagic,

    #[error("Unsupported protocol version: {0}")]
    BadVersion(u8),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("CRC mismatch: declared {declared:#010x}, computed {computed:#010x}")]
    CrcMismatch { declared: u32, computed: u32 },
}

/// Network errors. These trigger reconnection, never exit.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Socket configuration failed: {0}")]
    SocketConfig(String),
}

/// Control surface errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Control thread failed to start: {0}")]
    SpawnFailed(String),
}

/// Preview window errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display initialization failed: {0}")]
    Init(String),

    #[error("Render failed: {0}")]
    Render(String),
}

/// Snapshot errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Configuration errors. The only fatal class: rejected before any
/// worker starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Camera count must be between 1 and {max}, got {got}")]
    BadCameraCount { got: usize, max: usize },

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    BadQuality(u8),

    #[error("Frame dimensions must be non-zero, got {width}x{height}")]
    BadDimensions { width: u32, height: u32 },

    #[error("Target fps must be non-zero")]
    BadFps,

    #[error("Failed to read config file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    FileParse { path: String, reason: String },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
