//! Segment processor: bytes → samples → transcript lines.
//!
//! Runs as the single consumer of the segment queue. Whisper inference goes
//! through tokio::spawn_blocking so it never blocks the reader side of the
//! pipeline. A recognition failure on one segment is logged and isolated;
//! the next segment proceeds.

use crate::error::Result;
use crate::segment::types::{Segment, TranscriptLine};
use crate::stt::recognizer::Recognizer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Convert raw s16le PCM bytes to f32 samples in [-1, 1).
///
/// A trailing odd byte (possible only on the terminal partial segment) is
/// dropped.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// RMS amplitude of a sample window. Zero for an empty window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Configuration for the segment processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// RMS level below which a segment is flagged as likely silence.
    pub silence_rms: f32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            silence_rms: crate::defaults::SILENCE_RMS,
        }
    }
}

/// Converts segments to transcript lines via the recognizer.
pub struct SegmentProcessor<R: Recognizer> {
    recognizer: Arc<R>,
    config: ProcessorConfig,
}

impl<R: Recognizer> Clone for SegmentProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            recognizer: self.recognizer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: Recognizer + Send + Sync + 'static> SegmentProcessor<R> {
    /// Creates a new processor wrapping the given recognizer.
    pub fn new(recognizer: R, config: ProcessorConfig) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            config,
        }
    }

    /// Creates a new processor from an Arc.
    pub fn from_arc(recognizer: Arc<R>, config: ProcessorConfig) -> Self {
        Self { recognizer, config }
    }

    /// Processes a single segment synchronously.
    pub fn process(&self, segment: &Segment) -> Result<Vec<TranscriptLine>> {
        let samples = bytes_to_samples(&segment.bytes);
        let level = rms(&samples);
        if level < self.config.silence_rms {
            debug!(
                seq = segment.seq,
                level, "segment below silence threshold, likely silence"
            );
        }

        let spans = self.recognizer.recognize(&samples)?;
        Ok(spans
            .into_iter()
            .map(|span| TranscriptLine {
                offset_secs: segment.offset_secs + span.offset_secs,
                text: span.text,
            })
            .collect())
    }

    /// Runs the recognition worker.
    ///
    /// Receives segments, recognizes them on the blocking thread pool, and
    /// sends transcript lines. Exits when the input channel closes or the
    /// token is cancelled; on cancellation the queue remainder is dropped
    /// unprocessed.
    ///
    /// # Arguments
    /// * `input` - Receiver for segments
    /// * `output` - Sender for transcript lines
    /// * `cancel` - Cancellation token shared with the supervisor
    pub async fn run(
        self,
        mut input: mpsc::Receiver<Segment>,
        output: mpsc::Sender<TranscriptLine>,
        cancel: CancellationToken,
    ) {
        loop {
            let segment = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("recognition worker cancelled");
                    return;
                }
                segment = input.recv() => match segment {
                    Some(segment) => segment,
                    None => return,
                },
            };

            let seq = segment.seq;
            let processor = self.clone();
            let result =
                tokio::task::spawn_blocking(move || processor.process(&segment)).await;

            match result {
                Ok(Ok(lines)) => {
                    for line in lines {
                        if output.send(line).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => {
                    // Isolated: one bad segment never stops the pipeline.
                    warn!(seq, error = %e, "recognition failed, skipping segment");
                }
                Err(e) => {
                    warn!(seq, error = %e, "recognition task panicked, skipping segment");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::{MockRecognizer, RecognizedSpan};

    fn make_segment(seq: u64, offset_secs: f64, bytes: Vec<u8>) -> Segment {
        Segment {
            seq,
            offset_secs,
            bytes,
            is_tail: false,
        }
    }

    #[test]
    fn test_bytes_to_samples_scaling() {
        // 0x0000 = 0, 0x4000 = 16384 → 0.5, 0x8000 = -32768 → -1.0
        let bytes = vec![0x00, 0x00, 0x00, 0x40, 0x00, 0x80];
        let samples = bytes_to_samples(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[1], 0.5);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn test_bytes_to_samples_drops_odd_trailing_byte() {
        let samples = bytes_to_samples(&[0x00, 0x40, 0xff]);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 1600]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let samples = vec![0.5f32; 1000];
        assert!((rms(&samples) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_process_applies_absolute_offsets() {
        let recognizer = MockRecognizer::new("m").with_spans(vec![
            RecognizedSpan {
                offset_secs: 0.0,
                text: "start".to_string(),
            },
            RecognizedSpan {
                offset_secs: 4.5,
                text: "later".to_string(),
            },
        ]);
        let processor = SegmentProcessor::new(recognizer, ProcessorConfig::default());

        let segment = make_segment(2, 20.0, vec![0u8; 3200]);
        let lines = processor.process(&segment).unwrap();

        assert_eq!(lines[0].offset_secs, 20.0);
        assert_eq!(lines[0].text, "start");
        assert_eq!(lines[1].offset_secs, 24.5);
    }

    #[test]
    fn test_process_forwards_silent_segment() {
        // Below the silence threshold the segment is still recognized.
        let recognizer = MockRecognizer::new("m").with_text("still called");
        let processor = SegmentProcessor::new(recognizer, ProcessorConfig::default());

        let lines = processor
            .process(&make_segment(0, 0.0, vec![0u8; 3200]))
            .unwrap();
        assert_eq!(lines[0].text, "still called");
    }

    #[tokio::test]
    async fn test_run_emits_lines_and_exits_on_close() {
        let recognizer = MockRecognizer::new("m").with_text("line");
        let processor = SegmentProcessor::new(recognizer, ProcessorConfig::default());

        let (seg_tx, seg_rx) = mpsc::channel(4);
        let (line_tx, mut line_rx) = mpsc::channel(4);
        let worker = tokio::spawn(processor.run(seg_rx, line_tx, CancellationToken::new()));

        seg_tx
            .send(make_segment(0, 0.0, vec![0u8; 320]))
            .await
            .unwrap();
        seg_tx
            .send(make_segment(1, 10.0, vec![0u8; 320]))
            .await
            .unwrap();
        drop(seg_tx);

        let first = line_rx.recv().await.unwrap();
        assert_eq!(first.offset_secs, 0.0);
        let second = line_rx.recv().await.unwrap();
        assert_eq!(second.offset_secs, 10.0);
        assert!(line_rx.recv().await.is_none());

        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_on_one_segment_does_not_stop_the_next() {
        let recognizer = MockRecognizer::new("m")
            .with_text("ok")
            .fail_on_calls(vec![0]);
        let processor = SegmentProcessor::new(recognizer, ProcessorConfig::default());

        let (seg_tx, seg_rx) = mpsc::channel(4);
        let (line_tx, mut line_rx) = mpsc::channel(4);
        tokio::spawn(processor.run(seg_rx, line_tx, CancellationToken::new()));

        // Segment 0 fails, segment 1 succeeds.
        seg_tx
            .send(make_segment(0, 0.0, vec![0u8; 320]))
            .await
            .unwrap();
        seg_tx
            .send(make_segment(1, 10.0, vec![0u8; 320]))
            .await
            .unwrap();
        drop(seg_tx);

        let line = line_rx.recv().await.unwrap();
        assert_eq!(line.offset_secs, 10.0);
        assert!(line_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let recognizer = MockRecognizer::new("m");
        let processor = SegmentProcessor::new(recognizer, ProcessorConfig::default());

        let (seg_tx, seg_rx) = mpsc::channel(4);
        let (line_tx, _line_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(processor.run(seg_rx, line_tx, cancel.clone()));

        cancel.cancel();
        worker.await.unwrap();
        // Channel still open; worker exited because of the token.
        drop(seg_tx);
    }
}
