//! # EVOL CCTV Edge Node
//!
//! Multi-camera CCTV edge node: concurrent per-camera acquisition with
//! latest-frame-wins buffering, streamed as JPEG over framed TCP to a
//! central receiver. Freshness beats completeness at every stage.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              EDGE NODE                               │
//! │   ┌─────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐           │
//! │   │  Cam 0  │    │  Cam 1  │    │  Cam 2  │    │  Cam 3  │           │
//! │   └────┬────┘    └────┬────┘    └────┬────┘    └────┬────┘           │
//! │        ▼              ▼              ▼              ▼                │
//! │   ┌─────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐           │
//! │   │ Capture │    │ Capture │    │ Capture │    │ Capture │           │
//! │   │ Thread  │    │ Thread  │    │ Thread  │    │ Thread  │           │
//! │   └────┬────┘    └────┬────┘    └────┬────┘    └────┬────┘           │
//! │        ▼              ▼              ▼              ▼                │
//! │   ┌─────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐           │
//! │   │ Latest  │    │ Latest  │    │ Latest  │    │ Latest  │           │
//! │   │ Frame   │    │ Frame   │    │ Frame   │    │ Frame   │           │
//! │   └────┬────┘    └────┬────┘    └────┬────┘    └────┬────┘           │
//! │        └──────────────┴──────┬───────┴──────────────┘                │
//! │                              ▼                                       │
//! │   ┌──────────────────────────────────────────────────────────┐       │
//! │   │            Camera Manager (camera::manager)              │       │
//! │   │            frames() -> one slot, one Option              │       │
//! │   └──────────────────────────┬───────────────────────────────┘       │
//! │                              │ sampled by the node loop              │
//! │              ┌───────────────┼────────────────┐                      │
//! │              ▼               ▼                ▼                      │
//! │   ┌─────────────────┐  ┌───────────┐  ┌──────────────┐               │
//! │   │ Transmit Queue  │  │ Preview   │  │  Snapshot    │               │
//! │   │ (drop oldest,   │  │ (SDL2,    │  │  (JPEG grid  │               │
//! │   │  capacity 100)  │  │  optional)│  │   stills)    │               │
//! │   └────────┬────────┘  └───────────┘  └──────────────┘               │
//! │            ▼                                                         │
//! │   ┌─────────────────────────────────────────┐                        │
//! │   │     Stream Client (network::client)     │                        │
//! │   │   JPEG encode, framed TCP, reconnect    │                        │
//! │   └────────────────────┬────────────────────┘                        │
//! └────────────────────────┼─────────────────────────────────────────────┘
//!                          │ TCP over LAN
//!                          ▼
//!               ┌─────────────────────┐
//!               │  Central receiver   │
//!               │   (out of scope)    │
//!               └─────────────────────┘
//! ```

pub mod camera;
pub mod codec;
pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod network;
pub mod protocol;
pub mod snapshot;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Maximum number of camera slots per node
    pub const MAX_CAMERAS: usize = 4;

    /// Default capture width in pixels
    pub const DEFAULT_FRAME_WIDTH: u32 = 640;

    /// Default capture height in pixels
    pub const DEFAULT_FRAME_HEIGHT: u32 = 360;

    /// Default target capture rate in frames per second
    pub const DEFAULT_TARGET_FPS: u32 = 15;

    /// Default TCP port of the central receiver
    pub const DEFAULT_STREAM_PORT: u16 = 5050;

    /// Default JPEG quality for streamed frames
    pub const DEFAULT_JPEG_QUALITY: u8 = 70;

    /// Transmit queue capacity (frames); overflow evicts the oldest
    pub const TX_QUEUE_CAPACITY: usize = 100;

    /// How long the stream client blocks on an empty transmit queue
    pub const DEQUEUE_TIMEOUT_MS: u64 = 1000;

    /// TCP connect timeout
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;

    /// Fixed delay between reconnection attempts
    pub const RECONNECT_DELAY_SECS: u64 = 3;

    /// Delay before retrying a failed device read
    pub const READ_RETRY_DELAY_MS: u64 = 20;

    /// Consecutive failed reads before a slot is marked failed
    pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 100;

    /// Successful reads per throughput estimate window
    pub const FPS_ESTIMATE_WINDOW: u32 = 20;

    /// Settle time between stop and restart during a camera reload
    pub const RELOAD_SETTLE_MS: u64 = 500;

    /// Interval between periodic stats log lines
    pub const STATS_INTERVAL_SECS: u64 = 5;

    /// Audio capture sample rate (mono i16)
    pub const AUDIO_SAMPLE_RATE: u32 = 16_000;

    /// Samples per audio chunk
    pub const AUDIO_CHUNK_SAMPLES: usize = 1024;

    /// Audio chunk queue capacity; overflow drops the incoming chunk
    pub const AUDIO_QUEUE_CAPACITY: usize = 20;
}
