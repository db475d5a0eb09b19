//! Data frames carried one per datagram.
//!
//! A frame is the fixed header followed by exactly `payload_len` bytes of the
//! transfer. Anything after the declared payload is ignored on decode.

use crate::header::{FrameHeader, FRAME_HEADER_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

/// Default maximum payload carried by one frame
pub const DEFAULT_FRAGMENT_SIZE: usize = 1000;

/// Largest datagram produced with the default fragment size
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = FRAME_HEADER_SIZE + DEFAULT_FRAGMENT_SIZE;

/// Largest datagram a UDP socket can hand us
pub const MAX_UDP_DATAGRAM: usize = 65_535;

/// Largest fragment whose frame still fits one IPv4 UDP datagram
/// (UDP and IPv4 headers take 28 bytes)
pub const MAX_FRAGMENT_SIZE: usize = MAX_UDP_DATAGRAM - 8 - 20 - FRAME_HEADER_SIZE;

/// One fragment of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based fragment index
    pub seq: u32,
    /// Number of fragments in the transfer
    pub total: u32,
    /// Fragment bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(seq: u32, total: u32, payload: Bytes) -> Self {
        Self {
            seq,
            total,
            payload,
        }
    }

    /// Payload length as carried in the header
    ///
    /// Frames built by [`crate::Fragmenter`] never exceed [`MAX_FRAGMENT_SIZE`],
    /// so the length always fits.
    pub fn payload_len(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Header describing this frame
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(self.seq, self.total, self.payload_len())
    }

    /// Get the total frame size when encoded
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Encode frame to a contiguous buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.header().encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one frame from a datagram
    pub fn decode(datagram: &[u8]) -> Result<Self, crate::WireError> {
        let mut buf = datagram;
        let header = FrameHeader::decode(&mut buf)?;

        let payload_len = header.payload_len as usize;
        if buf.len() < payload_len {
            return Err(crate::WireError::Truncated {
                need: FRAME_HEADER_SIZE.saturating_add(payload_len),
                have: datagram.len(),
            });
        }

        Ok(Self {
            seq: header.seq,
            total: header.total,
            payload: Bytes::copy_from_slice(&buf[..payload_len]),
        })
    }
}
