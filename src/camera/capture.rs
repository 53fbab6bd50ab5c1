//! Per-camera acquisition worker
//!
//! One dedicated thread per active slot. Reads are blocking and paced
//! by the device; every successful read replaces the slot's latest
//! frame. Failed reads are retried after a short delay, and a slot
//! that keeps failing parks itself as failed while the rest of the
//! node keeps running.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::camera::device::{open_source, FrameSource, SlotConfig};
use crate::camera::frame::{unix_timestamp, SharedFrame, VideoFrame};
use crate::camera::latest::{create_shared_cell, SharedLatestFrame};
use crate::constants::{FPS_ESTIMATE_WINDOW, MAX_CONSECUTIVE_READ_FAILURES, READ_RETRY_DELAY_MS};
use crate::error::CaptureError;

/// Acquisition worker for a single camera slot
pub struct CameraWorker {
    /// Slot index this worker serves
    slot: u8,

    /// Whether capture should keep running
    running: Arc<AtomicBool>,

    /// Set when the read-failure threshold tripped
    failed: Arc<AtomicBool>,

    /// Latest-frame cell this worker publishes into
    latest: SharedLatestFrame,

    /// Most recent throughput estimate, f64 bits
    fps_bits: Arc<AtomicU64>,

    /// Total successful reads; doubles as the sequence counter
    frames_captured: Arc<AtomicU64>,

    /// Total failed reads
    read_failures: Arc<AtomicU64>,

    /// Capture thread handle
    thread_handle: Option<JoinHandle<()>>,
}

impl CameraWorker {
    /// Open the slot's device and start its acquisition thread
    ///
    /// The device is opened synchronously so open failures surface
    /// here instead of inside the thread.
    pub fn start(config: SlotConfig) -> std::result::Result<Self, CaptureError> {
        let source = open_source(&config)?;
        Self::start_with_source(&config, source)
    }

    /// Start the acquisition thread over an already-open source
    pub fn start_with_source(
        config: &SlotConfig,
        mut source: Box<dyn FrameSource>,
    ) -> std::result::Result<Self, CaptureError> {
        let slot = config.slot;
        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));
        let latest = create_shared_cell();
        let fps_bits = Arc::new(AtomicU64::new(0));
        let frames_captured = Arc::new(AtomicU64::new(0));
        let read_failures = Arc::new(AtomicU64::new(0));

        let thread_running = running.clone();
        let thread_failed = failed.clone();
        let thread_latest = latest.clone();
        let thread_fps = fps_bits.clone();
        let thread_frames = frames_captured.clone();
        let thread_read_failures = read_failures.clone();

        let handle = thread::Builder::new()
            .name(format!("cam-{}", slot))
            .spawn(move || {
                let mut window_start = Instant::now();
                let mut window_count: u32 = 0;
                let mut consecutive_failures: u32 = 0;

                while thread_running.load(Ordering::Relaxed) {
                    match source.read_frame() {
                        Ok(image) => {
                            consecutive_failures = 0;

                            let sequence = thread_frames.fetch_add(1, Ordering::Relaxed);
                            let frame =
                                VideoFrame::from_image(slot, sequence, unix_timestamp(), image);
                            thread_latest.store(Arc::new(frame));

                            window_count += 1;
                            if window_count >= FPS_ESTIMATE_WINDOW {
                                let elapsed = window_start.elapsed().as_secs_f64();
                                if elapsed > 0.0 {
                                    let fps = FPS_ESTIMATE_WINDOW as f64 / elapsed;
                                    thread_fps.store(fps.to_bits(), Ordering::Relaxed);
                                }
                                window_start = Instant::now();
                                window_count = 0;
                            }
                        }
                        Err(e) => {
                            thread_read_failures.fetch_add(1, Ordering::Relaxed);
                            consecutive_failures += 1;

                            if consecutive_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                                error!(
                                    slot,
                                    consecutive_failures, "too many failed reads, marking slot failed"
                                );
                                thread_failed.store(true, Ordering::SeqCst);
                                break;
                            }

                            if consecutive_failures == 1 {
                                warn!(slot, error = %e, "frame read failed, retrying");
                            } else {
                                debug!(slot, error = %e, consecutive_failures, "frame read failed");
                            }
                            thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                        }
                    }
                }

                // The source drops here, releasing the device handle.
                debug!(slot, "capture loop exited");
            })
            .map_err(|e| CaptureError::OpenFailed {
                device: config.device.clone(),
                reason: e.to_string(),
            })?;

        info!(slot, device = %config.device, "camera worker started");

        Ok(Self {
            slot,
            running,
            failed,
            latest,
            fps_bits,
            frames_captured,
            read_failures,
            thread_handle: Some(handle),
        })
    }

    /// Stop the worker and release its device. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            self.latest.clear();
            info!(slot = self.slot, "camera worker stopped");
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Newest frame this slot has published, if any
    pub fn latest_frame(&self) -> Option<SharedFrame> {
        self.latest.latest()
    }

    /// Most recent throughput estimate in frames per second
    ///
    /// Zero until the first estimate window completes.
    pub fn fps_estimate(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    /// Total successful reads since start
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Total failed reads since start
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// Whether the read-failure threshold tripped
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Whether the worker is live: started, not stopped, not failed
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.is_failed()
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
