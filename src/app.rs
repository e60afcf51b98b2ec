//! Application entry point.
//!
//! Composition root for the complete flow:
//! resolve → decode → segment → recognize → print.

use crate::config::Config;
use crate::decoder::{DecoderConfig, FfmpegLauncher};
use crate::error::{Result, ScribeError};
use crate::output;
use crate::resolver::YtDlpResolver;
use crate::retry::RetryPolicy;
use crate::segment::processor::{ProcessorConfig, SegmentProcessor};
use crate::stt::recognizer::Recognizer;
use crate::stt::whisper::{WhisperConfig, WhisperRecognizer};
use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Refuse to start streaming with a recognizer that can't transcribe, e.g.
/// a binary built without speech recognition support.
fn ensure_ready<R: Recognizer>(recognizer: &R) -> Result<()> {
    if recognizer.is_ready() {
        Ok(())
    } else {
        Err(ScribeError::Recognition {
            message: format!(
                "recognizer for model '{}' is not ready to transcribe",
                recognizer.model_name()
            ),
        })
    }
}

/// Run the transcription engine until clean end-of-stream, interrupt, or
/// retry exhaustion.
pub async fn run(config: Config) -> Result<()> {
    let locator = config
        .stream
        .locator
        .clone()
        .ok_or_else(|| ScribeError::ConfigInvalidValue {
            key: "stream.locator".to_string(),
            message: "no stream given; pass a URL or set stream.locator in the config".to_string(),
        })?;

    // Model loading is the slow part; do it before touching the network.
    info!(model = %config.stt.model, "loading model");
    let recognizer = WhisperRecognizer::new(WhisperConfig::from_stt(&config.stt))?;
    ensure_ready(&recognizer)?;
    info!(model = recognizer.model_name(), "model loaded");

    let cancel = CancellationToken::new();
    let (segment_tx, segment_rx) = mpsc::channel(config.audio.queue_depth);
    let (line_tx, line_rx) = mpsc::channel(config.audio.queue_depth);

    let processor = SegmentProcessor::new(
        recognizer,
        ProcessorConfig {
            silence_rms: config.audio.silence_rms,
        },
    );
    let worker = tokio::spawn(processor.run(segment_rx, line_tx, cancel.clone()));
    let printer = tokio::spawn(output::run_printer(line_rx));

    let interrupt_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            interrupt_cancel.cancel();
        }
    });

    let supervisor = Supervisor::new(
        SupervisorConfig {
            locator,
            chunk_size: config.audio.chunk_size(),
            chunk_duration: config.audio.chunk_duration(),
            read_timeout: config.retry.read_timeout(),
            transcribe_tail: config.audio.transcribe_tail,
            stable_streaming: config.retry.stable_streaming(),
        },
        RetryPolicy::from_config(&config.retry),
        YtDlpResolver::default(),
        FfmpegLauncher::new(DecoderConfig {
            sample_rate: config.audio.sample_rate,
            read_timeout: config.retry.read_timeout(),
            ..Default::default()
        }),
        cancel.clone(),
    );

    // run() consumes the segment sender; when it returns, the worker drains
    // the queue, closes the line channel, and the printer drains in turn.
    let outcome = supervisor.run(segment_tx).await;

    if worker.await.is_err() {
        warn!("recognition worker panicked during shutdown");
    }
    if printer.await.is_err() {
        warn!("transcript printer panicked during shutdown");
    }

    match outcome? {
        SupervisorOutcome::Completed { restarts } => {
            info!(restarts, "stream completed");
            Ok(())
        }
        SupervisorOutcome::Stopped => {
            info!("stopped");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::recognizer::MockRecognizer;

    #[test]
    fn test_ensure_ready_accepts_working_recognizer() {
        assert!(ensure_ready(&MockRecognizer::new("m")).is_ok());
    }

    #[test]
    fn test_ensure_ready_rejects_unready_recognizer() {
        let err = ensure_ready(&MockRecognizer::new("tiny").unready()).unwrap_err();
        match err {
            ScribeError::Recognition { message } => assert!(message.contains("tiny")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
