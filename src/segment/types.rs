//! Data types that flow between the reader and the recognition worker.

use std::fmt;

/// A fixed-length (or terminal partial) contiguous slice of the decoded
/// audio byte stream. Immutable once created; consumed exactly once by the
/// segment processor.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Strictly increasing sequence number, starting at 0 per session.
    pub seq: u64,
    /// Absolute offset of this segment from session start, in seconds.
    pub offset_secs: f64,
    /// Raw s16le PCM bytes. Exactly chunk_size long except for the terminal
    /// partial, which is shorter and marked `is_tail`.
    pub bytes: Vec<u8>,
    /// True only for the terminal partial flush at end-of-stream.
    pub is_tail: bool,
}

impl Segment {
    /// Duration of this segment's audio in seconds.
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        let samples = self.bytes.len() / crate::defaults::BYTES_PER_SAMPLE;
        samples as f64 / sample_rate as f64
    }
}

/// One timestamped transcript line, ready for stdout.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    /// Absolute time offset from session start, in seconds.
    pub offset_secs: f64,
    /// Transcribed text.
    pub text: String,
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}s] {}", self.offset_secs, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let segment = Segment {
            seq: 0,
            offset_secs: 0.0,
            bytes: vec![0u8; 320_000], // 10s at 16kHz s16le
            is_tail: false,
        };
        assert_eq!(segment.duration_secs(16000), 10.0);
    }

    #[test]
    fn test_tail_segment_duration() {
        let segment = Segment {
            seq: 3,
            offset_secs: 30.0,
            bytes: vec![0u8; 160_000], // 5s
            is_tail: true,
        };
        assert_eq!(segment.duration_secs(16000), 5.0);
    }

    #[test]
    fn test_transcript_line_format() {
        let line = TranscriptLine {
            offset_secs: 12.5,
            text: "hello world".to_string(),
        };
        assert_eq!(line.to_string(), "[12.50s] hello world");
    }

    #[test]
    fn test_transcript_line_format_rounds_to_two_decimals() {
        let line = TranscriptLine {
            offset_secs: 0.118,
            text: "x".to_string(),
        };
        assert_eq!(line.to_string(), "[0.12s] x");
    }
}
