//! Best-effort mic audio beside the video pipeline
//!
//! Chunks ride a small lock-free queue. When the queue is full the
//! incoming chunk is dropped, so audio can never push back on video.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

/// One chunk of mono i16 samples from a slot's microphone
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Slot the mic is paired with
    pub camera_id: u8,

    /// Per-mic sequence number
    pub sequence: u64,

    /// Capture time, Unix seconds
    pub timestamp: f64,

    /// Mono samples
    pub samples: Vec<i16>,
}

impl AudioChunk {
    /// Chunk duration in seconds at the given sample rate
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }
}

/// Bounded chunk queue; a full queue drops the incoming chunk
pub struct ChunkQueue {
    queue: ArrayQueue<AudioChunk>,
    pushed: AtomicUsize,
    dropped: AtomicUsize,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            pushed: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Push a chunk
    /// Returns false when the queue was full and the chunk was dropped
    pub fn push(&self, chunk: AudioChunk) -> bool {
        match self.queue.push(chunk) {
            Ok(()) => {
                self.pushed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop the oldest chunk
    pub fn pop(&self) -> Option<AudioChunk> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Chunks accepted
    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Chunks rejected by a full queue
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a chunk queue
pub type SharedChunkQueue = Arc<ChunkQueue>;

/// Create a new shared chunk queue
pub fn create_shared_queue(capacity: usize) -> SharedChunkQueue {
    Arc::new(ChunkQueue::new(capacity))
}

#[cfg(feature = "audio")]
pub use mic::MicCapture;

#[cfg(feature = "audio")]
mod mic {
    //! cpal-backed microphone capture feeding the chunk queue.

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::StreamConfig;
    use tracing::{error, info, warn};

    use super::{AudioChunk, SharedChunkQueue};
    use crate::camera::frame::unix_timestamp;
    use crate::constants::{AUDIO_CHUNK_SAMPLES, AUDIO_SAMPLE_RATE};
    use crate::error::CaptureError;

    /// Microphone capture paired with one camera slot
    pub struct MicCapture {
        camera_id: u8,
        running: Arc<AtomicBool>,
        chunks_captured: Arc<AtomicU64>,
        thread_handle: Option<JoinHandle<()>>,
    }

    impl MicCapture {
        /// Start capturing from the default input device
        pub fn start(
            camera_id: u8,
            queue: SharedChunkQueue,
        ) -> std::result::Result<Self, CaptureError> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| CaptureError::DeviceNotFound("default input".to_string()))?;

            let config = StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(AUDIO_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let running = Arc::new(AtomicBool::new(true));
            let chunks_captured = Arc::new(AtomicU64::new(0));

            let thread_running = running.clone();
            let cb_running = running.clone();
            let cb_chunks = chunks_captured.clone();

            let handle = thread::Builder::new()
                .name(format!("mic-{}", camera_id))
                .spawn(move || {
                    let mut pending: Vec<i16> = Vec::with_capacity(AUDIO_CHUNK_SAMPLES);
                    let mut sequence: u64 = 0;

                    let stream = device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if !cb_running.load(Ordering::Relaxed) {
                                return;
                            }

                            for &sample in data {
                                pending.push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                                if pending.len() >= AUDIO_CHUNK_SAMPLES {
                                    let samples = std::mem::replace(
                                        &mut pending,
                                        Vec::with_capacity(AUDIO_CHUNK_SAMPLES),
                                    );
                                    let chunk = AudioChunk {
                                        camera_id,
                                        sequence,
                                        timestamp: unix_timestamp(),
                                        samples,
                                    };
                                    sequence += 1;
                                    cb_chunks.fetch_add(1, Ordering::Relaxed);
                                    // May drop on a full queue; audio is best effort.
                                    let _ = queue.push(chunk);
                                }
                            }
                        },
                        move |err| {
                            warn!(error = %err, "mic stream error");
                        },
                        None,
                    );

                    match stream {
                        Ok(stream) => {
                            if let Err(e) = stream.play() {
                                error!(error = %e, "failed to start mic stream");
                                return;
                            }

                            while thread_running.load(Ordering::Relaxed) {
                                thread::sleep(Duration::from_millis(10));
                            }

                            // Stream drops here, stopping capture.
                        }
                        Err(e) => {
                            error!(error = %e, "failed to build mic stream");
                        }
                    }
                })
                .map_err(|e| CaptureError::OpenFailed {
                    device: "default input".to_string(),
                    reason: e.to_string(),
                })?;

            info!(camera_id, "mic capture started");

            Ok(Self {
                camera_id,
                running,
                chunks_captured,
                thread_handle: Some(handle),
            })
        }

        /// Stop capture. Idempotent.
        pub fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);

            if let Some(handle) = self.thread_handle.take() {
                let _ = handle.join();
                info!(camera_id = self.camera_id, "mic capture stopped");
            }
        }

        /// Chunks produced since start
        pub fn chunks_captured(&self) -> u64 {
            self.chunks_captured.load(Ordering::Relaxed)
        }
    }

    impl Drop for MicCapture {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chunk(sequence: u64) -> AudioChunk {
        AudioChunk {
            camera_id: 0,
            sequence,
            timestamp: 0.0,
            samples: vec![0i16; 64],
        }
    }

    #[test]
    fn test_full_queue_drops_incoming() {
        let queue = ChunkQueue::new(2);
        assert!(queue.push(test_chunk(0)));
        assert!(queue.push(test_chunk(1)));
        assert!(!queue.push(test_chunk(2)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pushed(), 2);
        assert_eq!(queue.dropped(), 1);

        // The queued chunks are the oldest two, in order.
        assert_eq!(queue.pop().unwrap().sequence, 0);
        assert_eq!(queue.pop().unwrap().sequence, 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk {
            camera_id: 0,
            sequence: 0,
            timestamp: 0.0,
            samples: vec![0i16; 16_000],
        };
        assert_eq!(chunk.duration_secs(16_000), 1.0);
    }
}
