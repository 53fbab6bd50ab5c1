//! Bounded transmit queue between the frame sampler and the stream client
//!
//! All cameras share one queue feeding one client. The queue never
//! blocks a producer: when full it evicts its oldest entry and takes
//! the newcomer. The consumer blocks with a timeout so stop requests
//! stay responsive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::camera::frame::SharedFrame;

/// Bounded drop-oldest queue of frames awaiting transmission
///
/// Under sustained overflow the guarantees are bounded size and
/// newest-wins; strict global FIFO across producers is not promised.
pub struct TransmitQueue {
    inner: Mutex<VecDeque<SharedFrame>>,
    available: Condvar,
    capacity: usize,
    enqueued: AtomicU64,
    evicted: AtomicU64,
}

impl TransmitQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "transmit queue capacity must be non-zero");

        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            enqueued: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Insert a frame, evicting the oldest entry first when full
    ///
    /// Never blocks and never fails.
    pub fn enqueue(&self, frame: SharedFrame) {
        let mut queue = self.inner.lock();
        if queue.len() == self.capacity {
            queue.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(frame);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        drop(queue);

        self.available.notify_one();
    }

    /// Take the oldest frame, waiting up to `timeout` while empty
    pub fn dequeue(&self, timeout: Duration) -> Option<SharedFrame> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock();

        loop {
            if let Some(frame) = queue.pop_front() {
                return Some(frame);
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames accepted since creation
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Frames evicted by overflow since creation
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to the transmit queue
pub type SharedTransmitQueue = Arc<TransmitQueue>;

/// Create a new shared transmit queue
pub fn create_shared_queue(capacity: usize) -> SharedTransmitQueue {
    Arc::new(TransmitQueue::new(capacity))
}
