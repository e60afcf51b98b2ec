//! Recognition seam: an opaque function from a sample window to timestamped
//! text spans.

use crate::error::{Result, ScribeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// One recognized span within a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSpan {
    /// Offset relative to the start of the recognized window, in seconds.
    pub offset_secs: f64,
    /// Recognized text.
    pub text: String,
}

/// Trait for speech recognition over one fixed-length sample window.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Recognizer: Send + Sync {
    /// Recognize speech in f32 mono samples normalized to [-1, 1).
    ///
    /// Returns zero or more (relative offset, text) spans.
    fn recognize(&self, samples: &[f32]) -> Result<Vec<RecognizedSpan>>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the recognizer is ready
    fn is_ready(&self) -> bool;
}

/// Implement Recognizer for Arc<T> to allow sharing across workers.
impl<T: Recognizer> Recognizer for Arc<T> {
    fn recognize(&self, samples: &[f32]) -> Result<Vec<RecognizedSpan>> {
        (**self).recognize(samples)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock recognizer for testing
#[derive(Debug)]
pub struct MockRecognizer {
    model_name: String,
    spans: Vec<RecognizedSpan>,
    fail_on_calls: Vec<u32>,
    ready: bool,
    calls: AtomicU32,
}

impl MockRecognizer {
    /// Create a new mock recognizer with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            spans: vec![RecognizedSpan {
                offset_secs: 0.0,
                text: "mock transcription".to_string(),
            }],
            fail_on_calls: Vec::new(),
            ready: true,
            calls: AtomicU32::new(0),
        }
    }

    /// Configure the mock to return a single span with the given text
    pub fn with_text(mut self, text: &str) -> Self {
        self.spans = vec![RecognizedSpan {
            offset_secs: 0.0,
            text: text.to_string(),
        }];
        self
    }

    /// Configure the mock to return specific spans
    pub fn with_spans(mut self, spans: Vec<RecognizedSpan>) -> Self {
        self.spans = spans;
        self
    }

    /// Fail on the given zero-based call indices, succeed otherwise
    pub fn fail_on_calls(mut self, calls: Vec<u32>) -> Self {
        self.fail_on_calls = calls;
        self
    }

    /// Report not-ready, like a recognizer built without its backend
    pub fn unready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Number of recognize calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _samples: &[f32]) -> Result<Vec<RecognizedSpan>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_calls.contains(&call) {
            return Err(ScribeError::Recognition {
                message: format!("mock recognition failure on call {}", call),
            });
        }
        Ok(self.spans.clone())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_recognizer_returns_spans() {
        let recognizer = MockRecognizer::new("test-model").with_text("hello");
        let spans = recognizer.recognize(&[0.0; 100]).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "hello");
        assert_eq!(spans[0].offset_secs, 0.0);
    }

    #[test]
    fn test_mock_recognizer_custom_spans() {
        let recognizer = MockRecognizer::new("m").with_spans(vec![
            RecognizedSpan {
                offset_secs: 0.5,
                text: "first".to_string(),
            },
            RecognizedSpan {
                offset_secs: 4.2,
                text: "second".to_string(),
            },
        ]);
        let spans = recognizer.recognize(&[]).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].offset_secs, 4.2);
    }

    #[test]
    fn test_mock_recognizer_fails_only_on_listed_calls() {
        let recognizer = MockRecognizer::new("m").fail_on_calls(vec![1]);
        assert!(recognizer.recognize(&[]).is_ok()); // call 0
        assert!(recognizer.recognize(&[]).is_err()); // call 1
        assert!(recognizer.recognize(&[]).is_ok()); // call 2
        assert_eq!(recognizer.calls(), 3);
    }

    #[test]
    fn test_mock_recognizer_can_report_unready() {
        let recognizer = MockRecognizer::new("m").unready();
        assert!(!recognizer.is_ready());
    }

    #[test]
    fn test_recognizer_trait_is_object_safe() {
        let recognizer: Box<dyn Recognizer> = Box::new(MockRecognizer::new("boxed"));
        assert_eq!(recognizer.model_name(), "boxed");
        assert!(recognizer.is_ready());
    }

    #[test]
    fn test_arc_recognizer_delegates() {
        let recognizer = Arc::new(MockRecognizer::new("shared").with_text("via arc"));
        let spans = Recognizer::recognize(&recognizer, &[]).unwrap();
        assert_eq!(spans[0].text, "via arc");
        assert_eq!(Recognizer::model_name(&recognizer), "shared");
    }
}
