//! Stream resolution: source locator → direct media URL + liveness flag.
//!
//! The core never inspects URLs itself; everything downstream keys off the
//! explicit `is_live` flag produced here.

use crate::error::{Result, ScribeError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::process::Command;
use tracing::debug;

/// A resolved stream: where to read from and whether it is ongoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    /// Direct media URL suitable for the decoder.
    pub url: String,
    /// True for an ongoing live stream, false for a finite recording.
    pub is_live: bool,
}

/// Trait for resolving a source locator to a playable stream.
///
/// This trait allows swapping implementations (real yt-dlp vs mock).
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, locator: &str) -> Result<ResolvedStream>;
}

/// Configuration for the yt-dlp resolver.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Path to the yt-dlp binary.
    pub binary: PathBuf,
    /// Format selectors tried in order until one yields a URL.
    pub format_preferences: Vec<String>,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            format_preferences: vec![
                "bestaudio[ext=webm]".to_string(),
                "bestaudio".to_string(),
                "best".to_string(),
            ],
        }
    }
}

/// Resolver backed by the yt-dlp command-line tool.
#[derive(Debug, Clone, Default)]
pub struct YtDlpResolver {
    config: YtDlpConfig,
}

impl YtDlpResolver {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    async fn try_format(&self, locator: &str, format: &str) -> Result<ResolvedStream> {
        // `--print urls --print is_live` emits the media URL followed by the
        // liveness field ("True"/"False"/"NA") on separate lines.
        let output = Command::new(&self.config.binary)
            .arg("-f")
            .arg(format)
            .args([
                "--print",
                "urls",
                "--print",
                "is_live",
                "--no-check-certificates",
                "--no-warnings",
            ])
            .arg(locator)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ScribeError::Resolution {
                locator: locator.to_string(),
                detail: format!("failed to run yt-dlp: {}", e),
            })?;

        if !output.status.success() {
            return Err(ScribeError::Resolution {
                locator: locator.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_print_output(&stdout).ok_or_else(|| ScribeError::Resolution {
            locator: locator.to_string(),
            detail: "yt-dlp produced no URL".to_string(),
        })
    }
}

/// Parse `--print urls --print is_live` output: first line is the URL,
/// last line the liveness field.
fn parse_print_output(stdout: &str) -> Option<ResolvedStream> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let url = lines.next()?.to_string();
    if !url.starts_with("http") {
        return None;
    }
    let is_live = lines.next_back().map(|l| l == "True").unwrap_or(false);
    Some(ResolvedStream { url, is_live })
}

#[async_trait]
impl StreamResolver for YtDlpResolver {
    async fn resolve(&self, locator: &str) -> Result<ResolvedStream> {
        let mut last_detail = "no format preferences configured".to_string();
        for format in &self.config.format_preferences {
            match self.try_format(locator, format).await {
                Ok(resolved) => {
                    debug!(format, url = %resolved.url, is_live = resolved.is_live, "resolved stream");
                    return Ok(resolved);
                }
                Err(e) => {
                    debug!(format, error = %e, "format rejected");
                    last_detail = e.to_string();
                }
            }
        }
        Err(ScribeError::Resolution {
            locator: locator.to_string(),
            detail: last_detail,
        })
    }
}

/// Mock resolver for testing.
#[derive(Debug)]
pub struct MockResolver {
    url: String,
    is_live: bool,
    fail_first: u32,
    calls: AtomicU32,
}

impl MockResolver {
    /// Resolver that always succeeds with the given URL.
    pub fn fixed(url: &str, is_live: bool) -> Self {
        Self {
            url: url.to_string(),
            is_live,
            fail_first: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// Resolver that fails every call.
    pub fn failing() -> Self {
        Self {
            url: String::new(),
            is_live: false,
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` calls, then succeed.
    pub fn fail_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Number of resolve calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamResolver for MockResolver {
    async fn resolve(&self, locator: &str) -> Result<ResolvedStream> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(ScribeError::Resolution {
                locator: locator.to_string(),
                detail: "mock resolution failure".to_string(),
            });
        }
        Ok(ResolvedStream {
            url: self.url.clone(),
            is_live: self.is_live,
        })
    }
}
