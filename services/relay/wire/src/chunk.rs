//! Fragmenting and reassembly of transfer payloads.
//!
//! The server splits a fetched body into frames with [`Fragmenter`]; the
//! client collects them with [`Reassembler`] until every sequence number of
//! the transfer has been seen.

use crate::frame::{Frame, DEFAULT_FRAGMENT_SIZE, MAX_FRAGMENT_SIZE};
use crate::WireError;
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use tracing::trace;

/// Number of frames needed for `len` bytes, never less than one
pub fn frame_count(len: usize, max_fragment_size: usize) -> usize {
    len.div_ceil(max_fragment_size).max(1)
}

/// Fragmenter for splitting payloads into frames
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter {
    max_fragment_size: usize,
}

impl Fragmenter {
    /// Create a fragmenter with the given maximum payload per frame
    ///
    /// The size must be in `1..=MAX_FRAGMENT_SIZE` so every frame fits one
    /// datagram.
    pub fn new(max_fragment_size: usize) -> Result<Self, WireError> {
        if !(1..=MAX_FRAGMENT_SIZE).contains(&max_fragment_size) {
            return Err(WireError::FragmentSize(max_fragment_size));
        }
        Ok(Self { max_fragment_size })
    }

    /// Maximum payload per frame
    pub fn max_fragment_size(&self) -> usize {
        self.max_fragment_size
    }

    /// Split a payload into an ordered frame sequence
    ///
    /// An empty payload yields a single empty frame so that the receiver
    /// still has something to complete on. Output depends only on the
    /// payload and the fragment size.
    pub fn fragment(&self, payload: &Bytes) -> Result<Vec<Frame>, WireError> {
        let count = frame_count(payload.len(), self.max_fragment_size);
        let total = u32::try_from(count).map_err(|_| WireError::TooManyFragments(count))?;

        let mut frames = Vec::with_capacity(count);
        let mut offset: usize = 0;

        for seq in 0..total {
            let end = offset
                .saturating_add(self.max_fragment_size)
                .min(payload.len());
            frames.push(Frame::new(seq, total, payload.slice(offset..end)));
            offset = end;
        }

        Ok(frames)
    }
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

/// Reassembler for collecting the frames of one transfer
#[derive(Debug, Default)]
pub struct Reassembler {
    expected_total: Option<u32>,
    fragments: BTreeMap<u32, Bytes>,
}

impl Reassembler {
    /// Create an empty reassembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Total count learned from the first accepted frame
    pub fn expected_total(&self) -> Option<u32> {
        self.expected_total
    }

    /// Number of distinct fragments stored
    pub fn received(&self) -> usize {
        self.fragments.len()
    }

    /// Whether every fragment of the transfer has been stored
    pub fn is_complete(&self) -> bool {
        self.expected_total
            .is_some_and(|total| self.fragments.len() == total as usize)
    }

    /// Store a frame and report whether the transfer is now complete
    ///
    /// Frames with `seq >= total` or whose total disagrees with the first
    /// accepted frame are rejected without touching the buffer. A repeated
    /// sequence number overwrites the stored payload.
    pub fn insert(&mut self, frame: Frame) -> Result<bool, WireError> {
        frame.header().validate()?;

        match self.expected_total {
            Some(expected) if expected != frame.total => {
                return Err(WireError::TotalMismatch {
                    expected,
                    got: frame.total,
                });
            }
            Some(_) => {}
            None => self.expected_total = Some(frame.total),
        }

        if self.fragments.insert(frame.seq, frame.payload).is_some() {
            trace!("Duplicate fragment overwritten: seq={}", frame.seq);
        }

        Ok(self.is_complete())
    }

    /// Concatenate the stored payloads in sequence order
    pub fn finish(self) -> Result<Bytes, WireError> {
        let total = self.expected_total.ok_or(WireError::Missing(0))?;
        if let Some(missing) = (0..total).find(|seq| !self.fragments.contains_key(seq)) {
            return Err(WireError::Missing(missing));
        }

        let size = self.fragments.values().map(Bytes::len).sum();
        let mut result = BytesMut::with_capacity(size);
        for fragment in self.fragments.values() {
            result.extend_from_slice(fragment);
        }
        Ok(result.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    fn reassemble(frames: Vec<Frame>) -> Bytes {
        let mut reassembler = Reassembler::new();
        for frame in frames {
            reassembler.insert(frame).unwrap();
        }
        reassembler.finish().unwrap()
    }

    #[test]
    fn test_round_trip_lengths() {
        let fragmenter = Fragmenter::new(1000).unwrap();
        for len in [0, 1, 999, 1000, 1001, 2500] {
            let payload = payload_of(len);
            let frames = fragmenter.fragment(&payload).unwrap();
            assert_eq!(reassemble(frames), payload, "length {}", len);
        }
    }

    #[test]
    fn test_frame_count_law() {
        let fragmenter = Fragmenter::new(1000).unwrap();
        for (len, expected) in [(0, 1), (1, 1), (999, 1), (1000, 1), (1001, 2), (2500, 3)] {
            let frames = fragmenter.fragment(&payload_of(len)).unwrap();
            assert_eq!(frames.len(), expected);
            assert_eq!(frame_count(len, 1000), expected);
            assert!(frames.iter().all(|f| f.total as usize == expected));
        }
    }

    #[test]
    fn test_fragment_sizes() {
        let frames = Fragmenter::new(1000)
            .unwrap()
            .fragment(&payload_of(2500))
            .unwrap();

        let sizes: Vec<_> = frames.iter().map(|f| (f.seq, f.payload.len())).collect();
        assert_eq!(sizes, vec![(0, 1000), (1, 1000), (2, 500)]);
    }

    #[test]
    fn test_empty_payload_single_frame() {
        let frames = Fragmenter::default().fragment(&Bytes::new()).unwrap();
        assert_eq!(frames, vec![Frame::new(0, 1, Bytes::new())]);
    }

    #[test]
    fn test_fragment_is_deterministic() {
        let fragmenter = Fragmenter::new(333).unwrap();
        let payload = payload_of(2000);

        let first: Vec<Bytes> = fragmenter
            .fragment(&payload)
            .unwrap()
            .iter()
            .map(Frame::encode)
            .collect();
        let second: Vec<Bytes> = fragmenter
            .fragment(&payload)
            .unwrap()
            .iter()
            .map(Frame::encode)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_fragment_size_bounds() {
        assert_eq!(Fragmenter::new(0).unwrap_err(), WireError::FragmentSize(0));
        assert_eq!(
            Fragmenter::new(MAX_FRAGMENT_SIZE + 1).unwrap_err(),
            WireError::FragmentSize(MAX_FRAGMENT_SIZE + 1)
        );
        assert_eq!(
            Fragmenter::new(usize::MAX).unwrap_err(),
            WireError::FragmentSize(usize::MAX)
        );
        assert_eq!(MAX_FRAGMENT_SIZE, 65_495);

        // Largest allowed size still yields datagrams a UDP socket accepts
        let fragmenter = Fragmenter::new(MAX_FRAGMENT_SIZE).unwrap();
        let frames = fragmenter.fragment(&Bytes::from(vec![1u8; 70_000])).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].encoded_size(), 65_507);
        assert_eq!(frames[0].payload_len() as usize, frames[0].payload.len());
    }

    #[test]
    fn test_out_of_order_and_duplicates() {
        let frames = Fragmenter::new(4).unwrap().fragment(&payload_of(10)).unwrap();
        let mut reassembler = Reassembler::new();

        assert!(!reassembler.insert(frames[2].clone()).unwrap());
        assert!(!reassembler.insert(frames[0].clone()).unwrap());
        assert!(!reassembler.insert(frames[0].clone()).unwrap());
        assert_eq!(reassembler.received(), 2);
        assert_eq!(reassembler.expected_total(), Some(3));

        assert!(reassembler.insert(frames[1].clone()).unwrap());
        assert_eq!(reassembler.finish().unwrap(), payload_of(10));
    }

    #[test]
    fn test_total_mismatch_rejected() {
        let mut reassembler = Reassembler::new();
        reassembler
            .insert(Frame::new(0, 3, Bytes::from_static(b"a")))
            .unwrap();

        let err = reassembler
            .insert(Frame::new(1, 4, Bytes::from_static(b"b")))
            .unwrap_err();
        assert_eq!(err, WireError::TotalMismatch { expected: 3, got: 4 });
        assert_eq!(reassembler.received(), 1);
    }

    #[test]
    fn test_sequence_out_of_range_rejected() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler
            .insert(Frame::new(3, 3, Bytes::from_static(b"a")))
            .is_err());
        assert!(reassembler.insert(Frame::new(0, 0, Bytes::new())).is_err());

        // Rejected frames must not pin the expected total
        assert_eq!(reassembler.expected_total(), None);
    }

    #[test]
    fn test_finish_incomplete() {
        let mut reassembler = Reassembler::new();
        reassembler
            .insert(Frame::new(0, 3, Bytes::from_static(b"a")))
            .unwrap();
        reassembler
            .insert(Frame::new(2, 3, Bytes::from_static(b"c")))
            .unwrap();

        assert!(!reassembler.is_complete());
        assert_eq!(reassembler.finish().unwrap_err(), WireError::Missing(1));
        assert_eq!(Reassembler::new().finish().unwrap_err(), WireError::Missing(0));
    }
}
