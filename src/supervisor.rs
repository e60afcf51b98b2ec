//! Session supervision: resolve → decode → stream, restart on failure.
//!
//! The supervisor owns the whole session lifecycle. It pulls deadline-bounded
//! reads from the decoder, slices them through the segment buffer, and pushes
//! segments into the bounded queue feeding the recognition worker. Stream-level
//! failures (resolution, launch, stall, decoder exit) all pass through one
//! retry policy; per-segment recognition failures never reach it.

use crate::decoder::{DecoderLauncher, ReadEvent};
use crate::error::{Result, ScribeError};
use crate::resolver::StreamResolver;
use crate::retry::{RetryPolicy, RetryState};
use crate::segment::buffer::{SegmentBuffer, SegmentBufferConfig};
use crate::segment::types::Segment;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Supervisor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Resolving,
    Decoding,
    Streaming,
    Stalled,
    Failed,
    Stopped,
}

/// How a supervisor run ended (errors are reported separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// Clean end-of-stream, terminal flush handled.
    Completed { restarts: u32 },
    /// External cancellation; teardown confirmed.
    Stopped,
}

/// Configuration for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Source locator handed to the resolver each session.
    pub locator: String,
    /// Exact segment length in bytes.
    pub chunk_size: usize,
    /// Audio duration of one full segment.
    pub chunk_duration: Duration,
    /// Read deadline, for stall reporting.
    pub read_timeout: Duration,
    /// Whether the terminal partial segment is transcribed or discarded.
    pub transcribe_tail: bool,
    /// Streaming duration after which the retry counter resets.
    pub stable_streaming: Duration,
}

/// How one session ended, with how long it streamed before failing.
enum SessionEnd {
    Completed,
    Cancelled,
    Failed {
        error: ScribeError,
        streamed: Option<Duration>,
    },
}

/// Orchestrates resolver, decoder, and segment queue across restarts.
pub struct Supervisor<R: StreamResolver, L: DecoderLauncher> {
    config: SupervisorConfig,
    policy: RetryPolicy,
    resolver: R,
    launcher: L,
    cancel: CancellationToken,
    state: SessionState,
}

impl<R: StreamResolver, L: DecoderLauncher> Supervisor<R, L> {
    pub fn new(
        config: SupervisorConfig,
        policy: RetryPolicy,
        resolver: R,
        launcher: L,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            policy,
            resolver,
            launcher,
            cancel,
            state: SessionState::Resolving,
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }

    /// Runs sessions until clean end-of-stream, cancellation, or retry
    /// exhaustion. Segments flow into `segments`; dropping the receiver is
    /// treated as cancellation.
    pub async fn run(mut self, segments: mpsc::Sender<Segment>) -> Result<SupervisorOutcome> {
        let mut retry = RetryState::new();
        let mut restarts = 0u32;

        loop {
            match self.run_session(&segments).await {
                SessionEnd::Completed => {
                    return Ok(SupervisorOutcome::Completed { restarts });
                }
                SessionEnd::Cancelled => {
                    self.set_state(SessionState::Stopped);
                    info!("stopped, session torn down");
                    return Ok(SupervisorOutcome::Stopped);
                }
                SessionEnd::Failed { error, streamed } => {
                    if let Some(streamed) = streamed
                        && streamed >= self.config.stable_streaming
                    {
                        debug!(?streamed, "sustained streaming period, resetting retry budget");
                        retry.reset();
                    }
                    self.set_state(SessionState::Stalled);

                    match retry.record_failure(&self.policy) {
                        Some(delay) => {
                            warn!(
                                attempt = retry.attempts(),
                                delay_secs = delay.as_secs_f64(),
                                %error,
                                "session failed, backing off before restart"
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = self.cancel.cancelled() => {
                                    self.set_state(SessionState::Stopped);
                                    return Ok(SupervisorOutcome::Stopped);
                                }
                            }
                            restarts += 1;
                        }
                        None => {
                            self.set_state(SessionState::Failed);
                            error!(%error, attempts = retry.attempts(), "retries exhausted");
                            return Err(ScribeError::RetriesExhausted {
                                attempts: retry.attempts(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Runs one resolve → decode → stream session to its end.
    async fn run_session(&mut self, segments: &mpsc::Sender<Segment>) -> SessionEnd {
        self.set_state(SessionState::Resolving);
        let resolved = tokio::select! {
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            resolved = self.resolver.resolve(&self.config.locator) => match resolved {
                Ok(resolved) => resolved,
                Err(error) => return SessionEnd::Failed { error, streamed: None },
            },
        };

        self.set_state(SessionState::Decoding);
        let mut decoder = match self.launcher.launch(&resolved.url, resolved.is_live).await {
            Ok(decoder) => decoder,
            Err(error) => return SessionEnd::Failed { error, streamed: None },
        };
        info!(is_live = resolved.is_live, "decoder session started");

        // Fresh buffer per session: partial audio from a dead session is
        // discarded, never stitched into the next one.
        let mut buffer = SegmentBuffer::new(SegmentBufferConfig {
            chunk_size: self.config.chunk_size,
            chunk_duration: self.config.chunk_duration,
        });
        let mut streaming_since: Option<Instant> = None;

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => {
                    decoder.terminate().await;
                    return SessionEnd::Cancelled;
                }
                event = decoder.read_event() => event,
            };
            let streamed = streaming_since.map(|t| t.elapsed());

            match event {
                Ok(ReadEvent::Data(bytes)) => {
                    if streaming_since.is_none() {
                        streaming_since = Some(Instant::now());
                        self.set_state(SessionState::Streaming);
                        info!("receiving audio");
                    }
                    buffer.push(&bytes);
                    while let Some(segment) = buffer.next_segment() {
                        // Bounded queue: send blocks when the worker lags,
                        // pushing backpressure into the decoder's pipe.
                        let sent = tokio::select! {
                            _ = self.cancel.cancelled() => Err(()),
                            sent = segments.send(segment) => sent.map_err(|_| ()),
                        };
                        if sent.is_err() {
                            decoder.terminate().await;
                            return SessionEnd::Cancelled;
                        }
                    }
                }
                Ok(ReadEvent::Eof) => {
                    if let Some(tail) = buffer.finish() {
                        if self.config.transcribe_tail {
                            debug!(seq = tail.seq, bytes = tail.bytes.len(), "terminal flush");
                            if segments.send(tail).await.is_err() {
                                debug!("worker gone before terminal flush");
                            }
                        } else {
                            debug!(
                                bytes = tail.bytes.len(),
                                "discarding terminal partial segment"
                            );
                        }
                    }
                    decoder.terminate().await;
                    info!("end of stream");
                    return SessionEnd::Completed;
                }
                Ok(ReadEvent::Stalled { idle }) => {
                    decoder.terminate().await;
                    return SessionEnd::Failed {
                        error: ScribeError::Stall {
                            idle,
                            timeout: self.config.read_timeout,
                        },
                        streamed,
                    };
                }
                Ok(ReadEvent::Exited { code, stderr_tail }) => {
                    decoder.terminate().await;
                    return SessionEnd::Failed {
                        error: ScribeError::DecoderExited { code, stderr_tail },
                        streamed,
                    };
                }
                Err(error) => {
                    decoder.terminate().await;
                    return SessionEnd::Failed { error, streamed };
                }
            }
        }
    }
}
