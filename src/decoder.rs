//! Decoder process management.
//!
//! Owns the external ffmpeg process that turns a media URL into raw
//! 16 kHz mono s16le PCM on a pipe. Reads are deadline-bounded so a hung
//! decoder surfaces as `Stalled` instead of blocking forever, and process
//! death is reported with its exit code and a tail of captured stderr.

use crate::error::{Result, ScribeError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Maximum stderr lines retained for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Bounded wait for the process to be reaped after its pipe closed or after
/// a kill signal was sent.
const EXIT_WAIT: Duration = Duration::from_secs(5);

/// Outcome of one deadline-bounded read from the decoder pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// Non-empty read; resets the stall clock.
    Data(Vec<u8>),
    /// The pipe closed and the process exited cleanly.
    Eof,
    /// No data within the read timeout while the process is still alive.
    Stalled { idle: Duration },
    /// The process died; diagnostics captured from stderr.
    Exited {
        code: Option<i32>,
        stderr_tail: String,
    },
}

/// A running decoder session's byte stream.
#[async_trait]
pub trait DecoderStream: Send + std::fmt::Debug {
    /// Perform one deadline-bounded read.
    async fn read_event(&mut self) -> Result<ReadEvent>;

    /// Tear the process down. Idempotent; guarantees the process is dead
    /// before returning.
    async fn terminate(&mut self);
}

/// Trait for launching decoder sessions (seam for tests).
#[async_trait]
pub trait DecoderLauncher: Send + Sync {
    async fn launch(&self, url: &str, is_live: bool) -> Result<Box<dyn DecoderStream>>;
}

/// Configuration for the ffmpeg decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Path to the ffmpeg binary.
    pub binary: PathBuf,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Deadline for a single read before the stream counts as stalled.
    pub read_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            sample_rate: crate::defaults::SAMPLE_RATE,
            read_timeout: Duration::from_secs(crate::defaults::READ_TIMEOUT_SECS),
        }
    }
}

/// Launches ffmpeg configured for raw mono s16le output on stdout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLauncher {
    config: DecoderConfig,
}

impl FfmpegLauncher {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, url: &str, is_live: bool) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(["-hide_banner", "-loglevel", "warning"]);
        cmd.args(["-protocol_whitelist", "file,http,https,tcp,tls"]);
        cmd.args(["-fflags", "+discardcorrupt+genpts"]);
        if is_live {
            // Live HTTP sources drop out; let ffmpeg re-establish the
            // connection itself before the stall detector has to.
            cmd.args(["-reconnect", "1", "-reconnect_streamed", "1"]);
            cmd.args(["-reconnect_delay_max", "5"]);
        }
        cmd.args(["-i", url]);
        cmd.args(["-ac", &crate::defaults::CHANNELS.to_string()]);
        cmd.args(["-ar", &self.config.sample_rate.to_string()]);
        cmd.args(["-f", "s16le", "pipe:1"]);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl DecoderLauncher for FfmpegLauncher {
    async fn launch(&self, url: &str, is_live: bool) -> Result<Box<dyn DecoderStream>> {
        let mut cmd = self.build_command(url, is_live);
        let mut child = cmd.spawn().map_err(|e| ScribeError::DecoderStart {
            message: format!("failed to spawn {}: {}", self.config.binary.display(), e),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| ScribeError::DecoderStart {
            message: "decoder stdout was not piped".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ScribeError::DecoderStart {
            message: "decoder stderr was not piped".to_string(),
        })?;

        // Drain stderr continuously so the decoder can't block on a full
        // pipe; keep only the most recent lines for diagnostics.
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail_writer = tail.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(mut tail) = tail_writer.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });

        debug!(is_live, "decoder process started");
        Ok(Box::new(DecoderProcess {
            child,
            stdout,
            stderr_tail: tail,
            read_timeout: self.config.read_timeout,
            last_data: Instant::now(),
            terminated: false,
        }))
    }
}

/// A live ffmpeg decoder process.
#[derive(Debug)]
pub struct DecoderProcess {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    read_timeout: Duration,
    last_data: Instant,
    terminated: bool,
}

impl DecoderProcess {
    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

#[async_trait]
impl DecoderStream for DecoderProcess {
    async fn read_event(&mut self) -> Result<ReadEvent> {
        let mut buf = vec![0u8; crate::defaults::READ_BUF_BYTES];
        match timeout(self.read_timeout, self.stdout.read(&mut buf)).await {
            Ok(Ok(0)) => {
                // Pipe closed. EOF is only clean if the process also exited
                // successfully; anything else is a decoder failure.
                match timeout(EXIT_WAIT, self.child.wait()).await {
                    Ok(Ok(status)) if status.success() => Ok(ReadEvent::Eof),
                    Ok(Ok(status)) => Ok(ReadEvent::Exited {
                        code: status.code(),
                        stderr_tail: self.stderr_tail(),
                    }),
                    Ok(Err(e)) => Err(e.into()),
                    Err(_) => {
                        warn!("decoder closed its pipe but did not exit; forcing teardown");
                        self.terminate().await;
                        Ok(ReadEvent::Exited {
                            code: None,
                            stderr_tail: self.stderr_tail(),
                        })
                    }
                }
            }
            Ok(Ok(n)) => {
                self.last_data = Instant::now();
                buf.truncate(n);
                Ok(ReadEvent::Data(buf))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => match self.child.try_wait()? {
                Some(status) => Ok(ReadEvent::Exited {
                    code: status.code(),
                    stderr_tail: self.stderr_tail(),
                }),
                None => Ok(ReadEvent::Stalled {
                    idle: self.last_data.elapsed(),
                }),
            },
        }
    }

    async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        if self.child.start_kill().is_err() {
            // Already dead and reaped.
            return;
        }
        if timeout(EXIT_WAIT, self.child.wait()).await.is_err() {
            // wait() should return promptly after SIGKILL; kill() is the
            // belt-and-braces fallback and also reaps.
            self.child.kill().await.ok();
        }
        debug!("decoder process terminated");
    }
}

/// Scripted decoder stream for testing the supervisor without processes.
#[derive(Debug)]
pub struct ScriptedStream {
    events: VecDeque<ReadEvent>,
    terminated: Arc<Mutex<bool>>,
}

#[async_trait]
impl DecoderStream for ScriptedStream {
    async fn read_event(&mut self) -> Result<ReadEvent> {
        Ok(self.events.pop_front().unwrap_or(ReadEvent::Eof))
    }

    async fn terminate(&mut self) {
        if let Ok(mut t) = self.terminated.lock() {
            *t = true;
        }
    }
}

/// Launcher that replays one event script per session.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    scripts: Mutex<VecDeque<Vec<ReadEvent>>>,
    launches: std::sync::atomic::AtomicU32,
    terminations: Arc<Mutex<Vec<Arc<Mutex<bool>>>>>,
}

impl ScriptedLauncher {
    pub fn new(scripts: Vec<Vec<ReadEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            launches: std::sync::atomic::AtomicU32::new(0),
            terminations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of sessions launched so far.
    pub fn launches(&self) -> u32 {
        self.launches.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// True when every launched stream was terminated.
    pub fn all_terminated(&self) -> bool {
        self.terminations
            .lock()
            .map(|flags| {
                flags
                    .iter()
                    .all(|f| f.lock().map(|t| *t).unwrap_or(false))
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl DecoderLauncher for ScriptedLauncher {
    async fn launch(&self, _url: &str, _is_live: bool) -> Result<Box<dyn DecoderStream>> {
        self.launches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let events = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .ok_or_else(|| ScribeError::DecoderStart {
                message: "scripted launcher exhausted".to_string(),
            })?;
        let terminated = Arc::new(Mutex::new(false));
        if let Ok(mut flags) = self.terminations.lock() {
            flags.push(terminated.clone());
        }
        Ok(Box::new(ScriptedStream {
            events: events.into(),
            terminated,
        }))
    }
}
