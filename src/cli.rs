//! Command-line interface for streamscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Live stream transcription to timestamped text
#[derive(Parser, Debug)]
#[command(
    name = "streamscribe",
    version,
    about = "Transcribe a live stream or recording to timestamped text on stdout"
)]
pub struct Cli {
    /// Stream URL or page locator (e.g. a YouTube watch URL)
    pub url: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Segment duration (default: 10s). Examples: 10, 30s, 1m
    #[arg(long, short = 'c', value_name = "DURATION", value_parser = parse_secs)]
    pub chunk: Option<u64>,

    /// Whisper model size (tiny, base, small, medium, large)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code for transcription (default: auto-detect). Examples: auto, en, de, es
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Seconds without decoder output before the session counts as stalled
    #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
    pub read_timeout: Option<u64>,

    /// Maximum consecutive failed attempts before giving up
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Base backoff delay between restart attempts
    #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
    pub backoff_base: Option<u64>,

    /// Discard the final partial segment instead of transcribing it
    #[arg(long)]
    pub drop_tail: bool,

    /// Suppress diagnostics (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose diagnostics (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string into seconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (seconds), single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`).
fn parse_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(url) = &self.url {
            config.stream.locator = Some(url.clone());
        }
        if let Some(chunk) = self.chunk {
            config.audio.chunk_secs = chunk;
        }
        if let Some(model) = &self.model {
            config.stt.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.stt.language = language.clone();
        }
        if let Some(read_timeout) = self.read_timeout {
            config.retry.read_timeout_secs = read_timeout;
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(backoff_base) = self.backoff_base {
            config.retry.backoff_base_secs = backoff_base;
        }
        if self.drop_tail {
            config.audio.transcribe_tail = false;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs_bare_number() {
        assert_eq!(parse_secs("30"), Ok(30));
    }

    #[test]
    fn test_parse_secs_humantime() {
        assert_eq!(parse_secs("30s"), Ok(30));
        assert_eq!(parse_secs("5m"), Ok(300));
        assert_eq!(parse_secs("1h30m"), Ok(5400));
    }

    #[test]
    fn test_parse_secs_rejects_garbage() {
        assert!(parse_secs("soon").is_err());
    }

    #[test]
    fn test_cli_url_positional() {
        let cli = Cli::parse_from(["streamscribe", "https://example.com/watch?v=x"]);
        assert_eq!(cli.url.as_deref(), Some("https://example.com/watch?v=x"));
        assert!(!cli.drop_tail);
    }

    #[test]
    fn test_cli_overrides_apply() {
        let cli = Cli::parse_from([
            "streamscribe",
            "https://example.com/live",
            "-c",
            "30s",
            "--model",
            "tiny",
            "--language",
            "en",
            "--max-retries",
            "2",
            "--drop-tail",
        ]);
        let config = cli.apply_to(Config::default());
        assert_eq!(
            config.stream.locator.as_deref(),
            Some("https://example.com/live")
        );
        assert_eq!(config.audio.chunk_secs, 30);
        assert_eq!(config.stt.model, "tiny");
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.retry.max_retries, 2);
        assert!(!config.audio.transcribe_tail);
    }

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["streamscribe"]);
        let config = cli.apply_to(Config::default());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_verbosity_count() {
        let cli = Cli::parse_from(["streamscribe", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
