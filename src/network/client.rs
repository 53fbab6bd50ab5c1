//! TCP streaming client
//!
//! Pulls frames from the transmit queue, JPEG encodes them, wraps each
//! one in a wire packet, and writes it to the central receiver over a
//! persistent TCP connection. When the link drops the client discards
//! the in-flight frame and retries the connection at a fixed delay for
//! as long as streaming stays enabled.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use socket2::{SockRef, TcpKeepalive};
use tracing::{debug, info, warn};

use crate::camera::frame::SharedFrame;
use crate::codec::{FrameEncoder, JpegFrameEncoder};
use crate::constants::{CONNECT_TIMEOUT_SECS, DEQUEUE_TIMEOUT_MS, RECONNECT_DELAY_SECS};
use crate::error::NetworkError;
use crate::network::queue::SharedTransmitQueue;
use crate::protocol::Packet;

/// Keepalive probe interval for idle links
const KEEPALIVE_TIME_SECS: u64 = 30;

/// How often the reconnect sleep rechecks the enabled flag
const SLEEP_SLICE_MS: u64 = 100;

/// Lifecycle of the streaming link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    /// Streaming disabled, no thread running
    Idle = 0,
    /// First connection attempt for this session
    Connecting = 1,
    /// Link up, frames flowing
    Streaming = 2,
    /// Link lost, waiting out the retry delay
    Reconnecting = 3,
}

impl LinkState {
    fn from_u8(value: u8) -> LinkState {
        match value {
            1 => LinkState::Connecting,
            2 => LinkState::Streaming,
            3 => LinkState::Reconnecting,
            _ => LinkState::Idle,
        }
    }
}

/// Snapshot of the client counters
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamClientStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub encode_failures: u64,
    pub reconnects: u64,
}

#[derive(Default)]
struct Counters {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    encode_failures: AtomicU64,
    reconnects: AtomicU64,
}

/// Streaming client for one receiver endpoint.
///
/// The transmit queue is handed in at construction and outlives any
/// single streaming session, so frames submitted while the client is
/// stopped are delivered after the next `start`.
pub struct StreamClient {
    host: String,
    port: u16,
    quality: u8,
    queue: SharedTransmitQueue,
    enabled: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
    /// Live socket, shared so stop() can shut it down mid-write
    socket: Arc<Mutex<Option<TcpStream>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Create a client for `host:port`. Streaming starts disabled.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        quality: u8,
        queue: SharedTransmitQueue,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            quality,
            queue,
            enabled: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(LinkState::Idle as u8)),
            counters: Arc::new(Counters::default()),
            socket: Arc::new(Mutex::new(None)),
            thread_handle: None,
        }
    }

    /// Submit a frame for transmission.
    ///
    /// Never blocks; once the queue is full the oldest queued frame is
    /// discarded to make room.
    pub fn send_frame(&self, frame: SharedFrame) {
        self.queue.enqueue(frame);
    }

    /// Enable streaming and spawn the sender thread.
    ///
    /// Calling start on an already enabled client is a no-op.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.state
            .store(LinkState::Connecting as u8, Ordering::SeqCst);

        let host = self.host.clone();
        let port = self.port;
        let quality = self.quality;
        let queue = self.queue.clone();
        let enabled = self.enabled.clone();
        let state = self.state.clone();
        let counters = self.counters.clone();
        let socket_slot = self.socket.clone();

        let handle = thread::Builder::new()
            .name("stream-client".to_string())
            .spawn(move || {
                stream_loop(
                    &host,
                    port,
                    quality,
                    &queue,
                    &enabled,
                    &state,
                    &counters,
                    &socket_slot,
                );
            })
            .map_err(|e| {
                self.enabled.store(false, Ordering::SeqCst);
                self.state.store(LinkState::Idle as u8, Ordering::SeqCst);
                NetworkError::ConnectionFailed(format!("sender thread spawn failed: {}", e))
            })?;

        self.thread_handle = Some(handle);
        info!(host = %self.host, port = self.port, "stream client started");
        Ok(())
    }

    /// Disable streaming, drop the connection, and join the sender
    /// thread. Idempotent.
    ///
    /// Queued frames are kept for the next session.
    pub fn stop(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);

        // Unblock a write stuck on a dead peer.
        if let Some(stream) = self.socket.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            info!("stream client stopped");
        }

        self.state.store(LinkState::Idle as u8, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn link_state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> StreamClientStats {
        StreamClientStats {
            packets_sent: self.counters.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            encode_failures: self.counters.encode_failures.load(Ordering::Relaxed),
            reconnects: self.counters.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn stream_loop(
    host: &str,
    port: u16,
    quality: u8,
    queue: &SharedTransmitQueue,
    enabled: &AtomicBool,
    state: &AtomicU8,
    counters: &Counters,
    socket_slot: &Mutex<Option<TcpStream>>,
) {
    let mut encoder = JpegFrameEncoder::new(quality);
    let mut scratch = BytesMut::new();

    while enabled.load(Ordering::SeqCst) {
        let stream = match connect(host, port) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(host, port, error = %e, "connect failed, retrying");
                sleep_while_enabled(enabled, Duration::from_secs(RECONNECT_DELAY_SECS));
                continue;
            }
        };

        match stream.try_clone() {
            Ok(clone) => *socket_slot.lock() = Some(clone),
            Err(e) => debug!(error = %e, "socket clone failed, stop will wait for write error"),
        }

        info!(host, port, "stream connected");
        state.store(LinkState::Streaming as u8, Ordering::SeqCst);

        pump_frames(stream, &mut encoder, &mut scratch, queue, enabled, counters);

        *socket_slot.lock() = None;
        if enabled.load(Ordering::SeqCst) {
            state.store(LinkState::Reconnecting as u8, Ordering::SeqCst);
            counters.reconnects.fetch_add(1, Ordering::Relaxed);
            sleep_while_enabled(enabled, Duration::from_secs(RECONNECT_DELAY_SECS));
        }
    }

    state.store(LinkState::Idle as u8, Ordering::SeqCst);
}

/// Send frames over an established link until it fails or streaming is
/// disabled. The frame being written when the link fails is lost.
fn pump_frames(
    mut stream: TcpStream,
    encoder: &mut JpegFrameEncoder,
    scratch: &mut BytesMut,
    queue: &SharedTransmitQueue,
    enabled: &AtomicBool,
    counters: &Counters,
) {
    while enabled.load(Ordering::SeqCst) {
        let Some(frame) = queue.dequeue(Duration::from_millis(DEQUEUE_TIMEOUT_MS)) else {
            continue;
        };

        let payload = match encoder.encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                counters.encode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(camera_id = frame.camera_id, error = %e, "encode failed, frame dropped");
                continue;
            }
        };

        let packet = Packet::new(frame.camera_id, frame.timestamp, payload);
        scratch.clear();
        packet.encode_into(scratch);

        if let Err(e) = stream.write_all(scratch) {
            warn!(error = %e, "stream write failed, reconnecting");
            return;
        }

        counters.packets_sent.fetch_add(1, Ordering::Relaxed);
        counters
            .bytes_sent
            .fetch_add(scratch.len() as u64, Ordering::Relaxed);
    }
}

fn connect(host: &str, port: u16) -> Result<TcpStream, NetworkError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| NetworkError::InvalidAddress(format!("{}:{}: {}", host, port, e)))?
        .collect();
    let addr = addrs.first().ok_or_else(|| {
        NetworkError::InvalidAddress(format!("{}:{} resolved to no addresses", host, port))
    })?;

    let stream = TcpStream::connect_timeout(addr, Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

    configure_socket(&stream)?;
    Ok(stream)
}

/// Low-latency socket settings plus keepalive so a silently dead peer
/// is detected between frames.
fn configure_socket(stream: &TcpStream) -> Result<(), NetworkError> {
    stream
        .set_nodelay(true)
        .map_err(|e| NetworkError::SocketConfig(e.to_string()))?;

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(Duration::from_secs(KEEPALIVE_TIME_SECS));
    sock.set_tcp_keepalive(&keepalive)
        .map_err(|e| NetworkError::SocketConfig(e.to_string()))?;

    Ok(())
}

/// Sleep in short slices so disabling the client cuts the retry delay
/// short.
fn sleep_while_enabled(enabled: &AtomicBool, total: Duration) {
    let slice = Duration::from_millis(SLEEP_SLICE_MS);
    let mut remaining = total;
    while enabled.load(Ordering::SeqCst) && !remaining.is_zero() {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::frame::{PixelLayout, VideoFrame};
    use crate::network::queue::create_shared_queue;
    use bytes::Bytes;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Instant;

    fn good_frame(camera_id: u8, sequence: u64) -> SharedFrame {
        let width = 4u32;
        let height = 2u32;
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        Arc::new(VideoFrame {
            camera_id,
            sequence,
            timestamp: 1_700_000_000.25,
            width,
            height,
            layout: PixelLayout::Rgb24,
            data: Bytes::from(data),
        })
    }

    /// Frame whose buffer does not match its dimensions, so encoding
    /// must fail.
    fn bad_frame(camera_id: u8) -> SharedFrame {
        Arc::new(VideoFrame {
            camera_id,
            sequence: 0,
            timestamp: 1_700_000_000.0,
            width: 4,
            height: 2,
            layout: PixelLayout::Rgb24,
            data: Bytes::from_static(&[0u8; 5]),
        })
    }

    fn read_packet(conn: &mut TcpStream, buf: &mut BytesMut) -> Packet {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(packet) = Packet::parse(buf).unwrap() {
                return packet;
            }
            let n = conn.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed mid-packet");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[test]
    fn test_streams_jpeg_packets_to_receiver() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let queue = create_shared_queue(10);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue.clone());

        client.send_frame(good_frame(1, 0));
        client.start().unwrap();

        let (mut conn, _) = listener.accept().unwrap();
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut buf = BytesMut::new();
        let packet = read_packet(&mut conn, &mut buf);
        assert_eq!(packet.camera_id, 1);
        assert!((packet.timestamp - 1_700_000_000.25).abs() < f64::EPSILON);
        // JPEG start-of-image marker
        assert_eq!(&packet.payload[..2], &[0xFF, 0xD8]);

        assert_eq!(client.link_state(), LinkState::Streaming);
        let deadline = Instant::now() + Duration::from_secs(2);
        while client.stats().packets_sent == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let stats = client.stats();
        assert!(stats.packets_sent >= 1);
        assert!(stats.bytes_sent > 0);

        client.stop();
        assert_eq!(client.link_state(), LinkState::Idle);
    }

    #[test]
    fn test_encode_failure_drops_only_that_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let queue = create_shared_queue(10);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue.clone());

        client.send_frame(bad_frame(7));
        client.send_frame(good_frame(3, 1));
        client.start().unwrap();

        let (mut conn, _) = listener.accept().unwrap();
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut buf = BytesMut::new();
        let packet = read_packet(&mut conn, &mut buf);
        assert_eq!(packet.camera_id, 3, "bad frame must be skipped, not sent");
        assert_eq!(client.stats().encode_failures, 1);

        // The sent counter updates just after the write we observed.
        let deadline = Instant::now() + Duration::from_secs(2);
        while client.stats().packets_sent == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(client.stats().packets_sent, 1);

        client.stop();
    }

    #[test]
    fn test_reconnects_after_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let queue = create_shared_queue(100);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue.clone());
        client.start().unwrap();

        let (mut conn, _) = listener.accept().unwrap();
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        client.send_frame(good_frame(2, 0));
        let mut buf = BytesMut::new();
        let first = read_packet(&mut conn, &mut buf);
        assert_eq!(first.camera_id, 2);

        // Kill the link from the receiver side, then keep submitting
        // frames until a write fails.
        drop(conn);
        let deadline = Instant::now() + Duration::from_secs(10);
        while client.stats().reconnects == 0 {
            assert!(Instant::now() < deadline, "no reconnect observed");
            client.send_frame(good_frame(2, 1));
            thread::sleep(Duration::from_millis(100));
        }

        // The client retries and lands on the same listener.
        let (mut conn2, _) = listener.accept().unwrap();
        conn2.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.send_frame(good_frame(2, 2));
        let mut buf2 = BytesMut::new();
        let again = read_packet(&mut conn2, &mut buf2);
        assert_eq!(again.camera_id, 2);
        assert!(client.stats().reconnects >= 1);

        client.stop();
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent_while_disconnected() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let queue = create_shared_queue(10);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue);
        client.start().unwrap();
        thread::sleep(Duration::from_millis(300));

        let start = Instant::now();
        client.stop();
        client.stop();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "stop must not wait out the full retry delay"
        );
        assert_eq!(client.link_state(), LinkState::Idle);
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_queue_survives_disable_enable_cycle() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let queue = create_shared_queue(10);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue.clone());

        client.send_frame(good_frame(0, 0));
        client.send_frame(good_frame(1, 1));
        assert_eq!(queue.len(), 2);

        // No receiver, so nothing can drain the queue.
        client.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        client.stop();
        assert_eq!(queue.len(), 2, "stopping must not discard queued frames");

        client.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        client.stop();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_link_state_reflects_connect_attempts() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let queue = create_shared_queue(10);
        let mut client = StreamClient::new("127.0.0.1", port, 70, queue);
        assert_eq!(client.link_state(), LinkState::Idle);

        client.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(client.link_state(), LinkState::Connecting);

        client.stop();
        assert_eq!(client.link_state(), LinkState::Idle);
    }
}
