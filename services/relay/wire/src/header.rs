//! Fixed frame header for relay datagrams.
//!
//! Every data datagram starts with a 12-byte big-endian header carrying the
//! fragment's position in the transfer and the length of the payload that
//! follows it.

use bytes::{Buf, BufMut, BytesMut};

/// Frame header size in bytes
pub const FRAME_HEADER_SIZE: usize = 12;

/// Frame header (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// 0-based fragment index
    pub seq: u32,
    /// Number of fragments in the transfer
    pub total: u32,
    /// Length of the payload following the header
    pub payload_len: u32,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(seq: u32, total: u32, payload_len: u32) -> Self {
        Self {
            seq,
            total,
            payload_len,
        }
    }

    /// Encode the header to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.seq);
        buf.put_u32(self.total);
        buf.put_u32(self.payload_len);
    }

    /// Decode the header from the front of `buf` (big-endian)
    ///
    /// Only the length is checked; `seq` and `total` are taken as-is.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, crate::WireError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(crate::WireError::Incomplete(buf.len()));
        }

        let seq = buf.get_u32();
        let total = buf.get_u32();
        let payload_len = buf.get_u32();

        Ok(Self {
            seq,
            total,
            payload_len,
        })
    }

    /// Check that `seq` lies inside `[0, total)`
    pub fn validate(&self) -> Result<(), crate::WireError> {
        if self.seq >= self.total {
            return Err(crate::WireError::Sequence {
                seq: self.seq,
                total: self.total,
            });
        }
        Ok(())
    }
}
