//! Chunking buffer: accumulates decoder bytes and emits exact fixed-size
//! segments.
//!
//! OS reads split the stream arbitrarily; segment boundaries are always
//! multiples of chunk_size from session start. Concatenating every emitted
//! segment reconstructs the input byte stream exactly once, in order.

use crate::segment::types::Segment;
use std::time::Duration;

/// Configuration for the segment buffer.
#[derive(Debug, Clone)]
pub struct SegmentBufferConfig {
    /// Exact segment length in bytes.
    pub chunk_size: usize,
    /// Audio duration of one full segment.
    pub chunk_duration: Duration,
}

/// Byte accumulator that slices the stream into sequence-numbered segments.
///
/// Lives for one session; a restarted session gets a fresh buffer (partial
/// audio from a dead session is discarded, not stitched).
#[derive(Debug)]
pub struct SegmentBuffer {
    config: SegmentBufferConfig,
    pending: Vec<u8>,
    next_seq: u64,
}

impl SegmentBuffer {
    pub fn new(config: SegmentBufferConfig) -> Self {
        debug_assert!(config.chunk_size > 0);
        Self {
            config,
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Append bytes from one pipe read.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet emitted.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Sequence number the next emitted segment will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Slice off the next full segment, if enough bytes have accumulated.
    /// Call in a loop after each `push`.
    pub fn next_segment(&mut self) -> Option<Segment> {
        if self.pending.len() < self.config.chunk_size {
            return None;
        }
        let rest = self.pending.split_off(self.config.chunk_size);
        let bytes = std::mem::replace(&mut self.pending, rest);
        Some(self.stamp(bytes, false))
    }

    /// Consume the buffer at end-of-stream, yielding the terminal partial
    /// segment when leftover bytes remain. Whether that partial is actually
    /// transcribed is the caller's policy.
    pub fn finish(mut self) -> Option<Segment> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        Some(self.stamp(bytes, true))
    }

    fn stamp(&mut self, bytes: Vec<u8>, is_tail: bool) -> Segment {
        let seq = self.next_seq;
        self.next_seq += 1;
        Segment {
            seq,
            offset_secs: seq as f64 * self.config.chunk_duration.as_secs_f64(),
            bytes,
            is_tail,
        }
    }
}
