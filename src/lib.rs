//! streamscribe - Live stream transcription to timestamped text
//!
//! Resolves a source locator to a direct media URL, decodes it to raw PCM
//! through an external ffmpeg process, slices the byte stream into exact
//! fixed-duration segments, and transcribes each segment with Whisper —
//! restarting failed sessions with bounded backoff.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod defaults;
pub mod error;
pub mod output;
pub mod resolver;
pub mod retry;
pub mod segment;
pub mod stt;
pub mod supervisor;

// Core seams (resolve → decode → recognize)
pub use decoder::{DecoderLauncher, DecoderStream, ReadEvent};
pub use resolver::{ResolvedStream, StreamResolver};
pub use stt::recognizer::Recognizer;

// Pipeline
pub use segment::{Segment, SegmentBuffer, SegmentProcessor, TranscriptLine};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorOutcome};

// Error handling
pub use error::{Result, ScribeError};

// Config
pub use config::{BackoffKind, Config};

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
