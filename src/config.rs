//! Configuration loading and defaults.
//!
//! Every tunable lives here as an explicit value; components receive their
//! configuration through constructors, never through globals.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub retry: RetryConfig,
}

/// Stream source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StreamConfig {
    /// Default source locator, used when none is given on the command line.
    pub locator: Option<String>,
}

/// Audio segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Segment duration in seconds.
    pub chunk_secs: u64,
    /// PCM sample rate; the decoder always resamples to this.
    pub sample_rate: u32,
    /// RMS level below which a segment is flagged as likely silence.
    pub silence_rms: f32,
    /// Whether the terminal partial segment at end-of-stream is transcribed
    /// (true) or discarded (false).
    pub transcribe_tail: bool,
    /// Capacity of the segment queue between reader and recognition worker.
    pub queue_depth: usize,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Model size selector ("tiny", "base", "small", "medium", "large").
    pub model: String,
    /// Language hint, or "auto" for detection.
    pub language: String,
    /// Beam width for decoding.
    pub beam_size: u32,
    /// No-speech probability threshold for voice-activity filtering.
    pub no_speech_threshold: f32,
    /// Run inference on the GPU when the binary was built with GPU support.
    pub use_gpu: bool,
    /// Inference threads (None = auto-detect).
    pub threads: Option<usize>,
}

/// Session retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Seconds without decoder output before the session counts as stalled.
    pub read_timeout_secs: u64,
    /// Maximum consecutive failed attempts before giving up.
    pub max_retries: u32,
    /// Base delay in seconds before a restart.
    pub backoff_base_secs: u64,
    /// Backoff escalation: "fixed" or "exponential".
    pub backoff: BackoffKind,
    /// Uninterrupted streaming duration after which the attempt counter resets.
    pub stable_streaming_secs: u64,
}

/// Backoff escalation strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_secs: defaults::CHUNK_SECS,
            sample_rate: defaults::SAMPLE_RATE,
            silence_rms: defaults::SILENCE_RMS,
            transcribe_tail: true,
            queue_depth: defaults::SEGMENT_QUEUE_DEPTH,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            beam_size: defaults::BEAM_SIZE,
            no_speech_threshold: defaults::NO_SPEECH_THRESHOLD,
            use_gpu: false,
            threads: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: defaults::READ_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
            backoff_base_secs: defaults::BACKOFF_BASE_SECS,
            backoff: BackoffKind::Exponential,
            stable_streaming_secs: defaults::STABLE_STREAMING_SECS,
        }
    }
}

impl AudioConfig {
    /// Segment size in bytes: sample_rate × chunk_secs × bytes per sample.
    pub fn chunk_size(&self) -> usize {
        self.sample_rate as usize * self.chunk_secs as usize * defaults::BYTES_PER_SAMPLE
    }

    /// Segment duration as a Duration.
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_secs(self.chunk_secs)
    }
}

impl RetryConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn stable_streaming(&self) -> Duration {
        Duration::from_secs(self.stable_streaming_secs)
    }
}

impl SttConfig {
    /// Resolve the model selector to a ggml model file path.
    ///
    /// Checks `STREAMSCRIBE_MODEL_DIR`, then `~/.cache/streamscribe/models`,
    /// then a local `models/` directory. Returns the first existing path, or
    /// the cache-dir path when no candidate exists (so the caller reports a
    /// useful location in its error).
    pub fn model_path(&self) -> PathBuf {
        let filename = format!("ggml-{}.bin", self.model);

        let mut candidates = Vec::new();
        if let Ok(dir) = std::env::var("STREAMSCRIBE_MODEL_DIR")
            && !dir.is_empty()
        {
            candidates.push(PathBuf::from(dir).join(&filename));
        }
        if let Some(cache) = dirs::cache_dir() {
            candidates.push(cache.join("streamscribe/models").join(&filename));
        }
        candidates.push(PathBuf::from("models").join(&filename));

        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .unwrap_or_else(|| {
                candidates
                    .first()
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(filename))
            })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - STREAMSCRIBE_MODEL → stt.model
    /// - STREAMSCRIBE_LANGUAGE → stt.language
    /// - STREAMSCRIBE_URL → stream.locator
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("STREAMSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("STREAMSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(url) = std::env::var("STREAMSCRIBE_URL")
            && !url.is_empty()
        {
            self.stream.locator = Some(url);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/streamscribe/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("streamscribe").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.audio.chunk_secs, 10);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(config.audio.transcribe_tail);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);
        assert_eq!(config.stt.model, "small");
        assert_eq!(config.stt.no_speech_threshold, 0.6);
        assert!(config.stream.locator.is_none());
    }

    #[test]
    fn test_chunk_size_formula() {
        // 16000 Hz × 10 s × 2 bytes = 320000 bytes
        let audio = AudioConfig::default();
        assert_eq!(audio.chunk_size(), 320_000);

        let audio = AudioConfig {
            chunk_secs: 3,
            ..Default::default()
        };
        assert_eq!(audio.chunk_size(), 96_000);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[audio]\nchunk_secs = 5\n\n[retry]\nbackoff = \"fixed\"\nmax_retries = 2"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.audio.chunk_secs, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.retry.backoff, BackoffKind::Fixed);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.stt.model, "small");
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = =").unwrap();
        assert!(Config::load(file.path()).is_err());
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/streamscribe.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_retry_durations() {
        let retry = RetryConfig::default();
        assert_eq!(retry.read_timeout(), Duration::from_secs(30));
        assert_eq!(retry.backoff_base(), Duration::from_secs(2));
        assert_eq!(retry.stable_streaming(), Duration::from_secs(60));
    }

    #[test]
    fn test_model_path_uses_selector_in_filename() {
        let stt = SttConfig {
            model: "definitely-not-installed".to_string(),
            ..Default::default()
        };
        let path = stt.model_path();
        assert!(
            path.to_string_lossy()
                .contains("ggml-definitely-not-installed.bin")
        );
    }

    #[test]
    fn test_backoff_kind_serde() {
        let config: Config = toml::from_str("[retry]\nbackoff = \"exponential\"").unwrap();
        assert_eq!(config.retry.backoff, BackoffKind::Exponential);
        let config: Config = toml::from_str("[retry]\nbackoff = \"fixed\"").unwrap();
        assert_eq!(config.retry.backoff, BackoffKind::Fixed);
    }
}
