//! Speech-to-text recognition.

pub mod recognizer;
pub mod whisper;

pub use recognizer::{MockRecognizer, RecognizedSpan, Recognizer};
pub use whisper::{WhisperConfig, WhisperRecognizer};
