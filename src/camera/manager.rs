//! Fixed slot table of camera workers
//!
//! The table size is set at construction and never changes. Slot index
//! is the camera id everywhere downstream, so a slot whose device
//! fails to open stays empty instead of shifting its neighbors.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::camera::audio::{create_shared_queue, SharedChunkQueue};
#[cfg(feature = "audio")]
use crate::camera::audio::MicCapture;
use crate::camera::capture::CameraWorker;
use crate::camera::device::{DeviceBackend, SlotConfig};
use crate::camera::frame::SharedFrame;
use crate::constants::{AUDIO_QUEUE_CAPACITY, MAX_CAMERAS, RELOAD_SETTLE_MS};
use crate::error::ConfigError;

/// Capture settings shared by every slot
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Number of slots, 1..=MAX_CAMERAS
    pub cameras: usize,
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Backend for every slot; Auto resolves at worker construction
    pub backend: DeviceBackend,

    /// Per-slot device overrides; a missing entry defaults to the
    /// slot index as a device spec
    pub devices: Vec<String>,

    /// Capture mic audio alongside slot 0
    pub audio: bool,
}

/// One table entry: a fixed index and maybe a live worker
struct CameraSlot {
    index: u8,
    worker: Option<CameraWorker>,
}

/// Per-slot status snapshot for stats reporting
#[derive(Debug, Clone)]
pub struct SlotStatus {
    pub slot: u8,
    pub running: bool,
    pub failed: bool,
    pub fps: f64,
    pub frames_captured: u64,
    pub read_failures: u64,
}

/// Owns every camera slot of the node
pub struct CameraManager {
    slots: Vec<CameraSlot>,
    settings: CameraSettings,
    audio_queue: SharedChunkQueue,
    #[cfg(feature = "audio")]
    mic: Option<MicCapture>,
}

impl CameraManager {
    /// Build a table of `settings.cameras` empty slots
    pub fn new(settings: CameraSettings) -> std::result::Result<Self, ConfigError> {
        if settings.cameras == 0 || settings.cameras > MAX_CAMERAS {
            return Err(ConfigError::BadCameraCount {
                got: settings.cameras,
                max: MAX_CAMERAS,
            });
        }

        let slots = (0..settings.cameras)
            .map(|i| CameraSlot {
                index: i as u8,
                worker: None,
            })
            .collect();

        Ok(Self {
            slots,
            settings,
            audio_queue: create_shared_queue(AUDIO_QUEUE_CAPACITY),
            #[cfg(feature = "audio")]
            mic: None,
        })
    }

    /// Start a worker for every empty slot
    ///
    /// A slot whose device fails to open logs the error and stays
    /// empty. Returns the number of workers started.
    pub fn start_all(&mut self) -> usize {
        let mut started = 0;
        for i in 0..self.slots.len() {
            if self.slots[i].worker.is_some() {
                continue;
            }

            let config = self.slot_config(self.slots[i].index);
            match CameraWorker::start(config) {
                Ok(worker) => {
                    self.slots[i].worker = Some(worker);
                    started += 1;
                }
                Err(e) => {
                    error!(slot = i, error = %e, "failed to start camera");
                }
            }
        }

        #[cfg(feature = "audio")]
        self.start_mic();
        #[cfg(not(feature = "audio"))]
        if self.settings.audio {
            warn!("audio capture requested but not compiled into this build");
        }

        info!(started, slots = self.slots.len(), "camera startup complete");
        started
    }

    /// Stop every worker. Idempotent.
    pub fn stop_all(&mut self) {
        #[cfg(feature = "audio")]
        if let Some(mut mic) = self.mic.take() {
            mic.stop();
        }

        for slot in &mut self.slots {
            if let Some(mut worker) = slot.worker.take() {
                worker.stop();
            }
        }
    }

    /// Stop everything, let devices settle, then start again
    ///
    /// The settle pause gives replugged cameras time to re-enumerate.
    pub fn reload(&mut self) -> usize {
        info!("reloading cameras");
        self.stop_all();
        thread::sleep(Duration::from_millis(RELOAD_SETTLE_MS));
        self.start_all()
    }

    /// Latest frame per slot; position i belongs to slot i
    ///
    /// The returned vector's length always equals the slot count.
    /// Empty slots, failed workers and not-yet-captured slots yield
    /// `None` at their position.
    pub fn frames(&self) -> Vec<Option<SharedFrame>> {
        self.slots
            .iter()
            .map(|slot| slot.worker.as_ref().and_then(|w| w.latest_frame()))
            .collect()
    }

    /// Per-slot status for the stats line
    pub fn statuses(&self) -> Vec<SlotStatus> {
        self.slots
            .iter()
            .map(|slot| match &slot.worker {
                Some(worker) => SlotStatus {
                    slot: slot.index,
                    running: worker.is_running(),
                    failed: worker.is_failed(),
                    fps: worker.fps_estimate(),
                    frames_captured: worker.frames_captured(),
                    read_failures: worker.read_failures(),
                },
                None => SlotStatus {
                    slot: slot.index,
                    running: false,
                    failed: false,
                    fps: 0.0,
                    frames_captured: 0,
                    read_failures: 0,
                },
            })
            .collect()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slots with a live worker
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.worker.as_ref().map(|w| w.is_running()).unwrap_or(false))
            .count()
    }

    /// Queue mic chunks land on
    pub fn audio_queue(&self) -> SharedChunkQueue {
        self.audio_queue.clone()
    }

    fn slot_config(&self, slot: u8) -> SlotConfig {
        let device = self
            .settings
            .devices
            .get(slot as usize)
            .cloned()
            .unwrap_or_else(|| slot.to_string());

        SlotConfig {
            slot,
            device,
            backend: self.settings.backend,
            width: self.settings.width,
            height: self.settings.height,
            fps: self.settings.fps,
            audio: self.settings.audio && slot == 0,
        }
    }

    #[cfg(feature = "audio")]
    fn start_mic(&mut self) {
        if !self.settings.audio || self.mic.is_some() {
            return;
        }
        match MicCapture::start(0, self.audio_queue.clone()) {
            Ok(mic) => self.mic = Some(mic),
            Err(e) => warn!(error = %e, "mic capture unavailable"),
        }
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
