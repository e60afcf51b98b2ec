//! Default configuration constants for streamscribe.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition; the decoder is always
/// configured to resample to this rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of channels the decoder emits. Always mono for speech models.
pub const CHANNELS: u32 = 1;

/// Bytes per PCM sample (signed 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Default segment duration in seconds.
///
/// 10 seconds gives Whisper enough context for coherent sentences while
/// keeping end-to-end latency acceptable for a live stream.
pub const CHUNK_SECS: u64 = 10;

/// Default read timeout in seconds before a silent decoder counts as stalled.
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of consecutive session restarts before giving up.
pub const MAX_RETRIES: u32 = 5;

/// Default base backoff delay in seconds between session restarts.
pub const BACKOFF_BASE_SECS: u64 = 2;

/// Upper bound on a single backoff delay in seconds, regardless of attempt count.
pub const BACKOFF_CAP_SECS: u64 = 120;

/// Default minimum uninterrupted streaming duration, in seconds, after which
/// the retry counter resets to zero.
pub const STABLE_STREAMING_SECS: u64 = 60;

/// Minimum RMS amplitude for a segment to be considered non-silent.
///
/// Segments below this are still sent to the recognizer but flagged in the
/// diagnostics as likely silence.
pub const SILENCE_RMS: f32 = 0.001;

/// Default capacity of the segment queue between the reader and the
/// recognition worker. When full, the reader blocks, pushing backpressure
/// into the decoder's OS pipe buffer.
pub const SEGMENT_QUEUE_DEPTH: usize = 8;

/// Size of a single pipe read from the decoder, in bytes.
pub const READ_BUF_BYTES: usize = 4096;

/// Default Whisper model size.
pub const DEFAULT_MODEL: &str = "small";

/// Default language hint for transcription.
///
/// "auto" lets Whisper detect the spoken language. Set a specific code
/// (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default beam width for Whisper decoding.
pub const BEAM_SIZE: u32 = 5;

/// Default no-speech probability threshold for Whisper's voice-activity
/// filtering. Windows the model scores above this are treated as non-speech.
/// 0.6 is whisper.cpp's own default.
pub const NO_SPEECH_THRESHOLD: f32 = 0.6;
