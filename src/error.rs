//! Error types for streamscribe.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Stream resolution errors
    #[error("No playable audio format for {locator}: {detail}")]
    Resolution { locator: String, detail: String },

    // Decoder process errors
    #[error("Failed to launch decoder: {message}")]
    DecoderStart { message: String },

    #[error("Decoder produced no data for {idle:?} (timeout {timeout:?})")]
    Stall { idle: Duration, timeout: Duration },

    #[error("Decoder exited unexpectedly (code {code:?}): {stderr_tail}")]
    DecoderExited {
        code: Option<i32>,
        stderr_tail: String,
    },

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Supervisor terminal failure
    #[error("Giving up after {attempts} failed attempts")]
    RetriesExhausted { attempts: u32 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Whether a stream-level failure of this kind should pass through the
    /// retry policy before escalating. Per-segment recognition failures never
    /// reach the supervisor, so they are not retryable here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScribeError::Resolution { .. }
                | ScribeError::DecoderStart { .. }
                | ScribeError::Stall { .. }
                | ScribeError::DecoderExited { .. }
                | ScribeError::Io(_)
        )
    }
}
