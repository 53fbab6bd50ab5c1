//! Wire protocol for the frame stream
//!
//! Every frame travels as one self-describing packet, all integers
//! big-endian:
//!
//! ```text
//! offset  size  field
//!      0     8  magic "EVOLCCTV"
//!      8     1  protocol version (1)
//!      9     1  camera id
//!     10     8  capture timestamp, f64 Unix seconds
//!     18     4  payload length, u32
//!     22     N  JPEG payload
//!   22+N     4  CRC-32 of the payload, u32
//! ```
//!
//! The node only encodes; `parse` exists for receivers and tests.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Packet magic, the first bytes of every frame on the wire
pub const MAGIC: &[u8; 8] = b"EVOLCCTV";

/// Current protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header length: magic, version, camera id, timestamp, length
pub const HEADER_LEN: usize = 8 + 1 + 1 + 8 + 4;

/// Trailing CRC-32 length
pub const TRAILER_LEN: usize = 4;

/// Upper bound on payload size the parser accepts
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// One frame packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub camera_id: u8,

    /// Capture time, Unix seconds
    pub timestamp: f64,

    /// JPEG bytes
    pub payload: Bytes,
}

impl Packet {
    pub fn new(camera_id: u8, timestamp: f64, payload: Bytes) -> Self {
        Self {
            camera_id,
            timestamp,
            payload,
        }
    }

    /// Total encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + TRAILER_LEN
    }

    /// Append the packet to `buf` in wire order
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(MAGIC);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.camera_id);
        buf.put_f64(self.timestamp);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.put_u32(crc32fast::hash(&self.payload));
    }

    /// Encode to a fresh contiguous buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Parse one packet from the front of `buf`
    ///
    /// Returns `Ok(None)` without consuming anything while `buf` does
    /// not yet hold a complete packet. On success the packet's bytes
    /// are consumed from `buf`; header fields are validated once the
    /// fixed header is buffered.
    pub fn parse(buf: &mut BytesMut) -> std::result::Result<Option<Packet>, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        if &buf[..MAGIC.len()] != MAGIC {
            return Err(ProtocolError::BadMagic);
        }

        let version = buf[8];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::BadVersion(version));
        }

        let payload_len = u32::from_be_bytes([buf[18], buf[19], buf[20], buf[21]]) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(payload_len));
        }

        let total = HEADER_LEN + payload_len + TRAILER_LEN;
        if buf.len() < total {
            return Ok(None);
        }

        // Whole packet buffered; consume it.
        buf.advance(MAGIC.len() + 1);
        let camera_id = buf.get_u8();
        let timestamp = buf.get_f64();
        let _declared_len = buf.get_u32();
        let payload = buf.split_to(payload_len).freeze();
        let declared = buf.get_u32();

        let computed = crc32fast::hash(&payload);
        if declared != computed {
            return Err(ProtocolError::CrcMismatch { declared, computed });
        }

        Ok(Some(Packet {
            camera_id,
            timestamp,
            payload,
        }))
    }
}
