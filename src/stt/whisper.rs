//! Whisper-based speech recognition.
//!
//! This module provides a Whisper implementation of the Recognizer trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::config::SttConfig;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::stt::recognizer::{RecognizedSpan, Recognizer};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper recognizer.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es") or "auto"
    pub language: String,
    /// Beam width for decoding
    pub beam_size: u32,
    /// No-speech probability threshold for voice-activity filtering
    pub no_speech_threshold: f32,
    /// Run inference on the GPU when compiled with GPU support
    pub use_gpu: bool,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-small.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            beam_size: defaults::BEAM_SIZE,
            no_speech_threshold: defaults::NO_SPEECH_THRESHOLD,
            use_gpu: false,
            threads: None,
        }
    }
}

impl WhisperConfig {
    /// Build from app-level STT configuration.
    pub fn from_stt(stt: &SttConfig) -> Self {
        Self {
            model_path: stt.model_path(),
            language: stt.language.clone(),
            beam_size: stt.beam_size,
            no_speech_threshold: stt.no_speech_threshold,
            use_gpu: stt.use_gpu,
            threads: stt.threads,
        }
    }
}

/// Whisper-based recognizer implementation.
///
/// The WhisperContext is wrapped in a Mutex to ensure thread safety.
///
/// # Feature Gate
///
/// The real implementation is only available when the `whisper` feature is
/// enabled; without it a stub that reports not-ready takes its place.
#[cfg(feature = "whisper")]
pub struct WhisperRecognizer {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper recognizer placeholder (without whisper feature).
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperRecognizer {
    config: WhisperConfig,
    model_name: String,
}

fn model_name_from_path(path: &PathBuf) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperRecognizer {
    /// Create a new Whisper recognizer.
    ///
    /// # Errors
    /// Returns `ScribeError::ModelNotFound` if the model file doesn't exist
    /// Returns `ScribeError::Recognition` if model loading fails
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(ScribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(config.use_gpu);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| ScribeError::Recognition {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| ScribeError::Recognition {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperRecognizer {
    /// Create a new Whisper recognizer (stub implementation).
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(ScribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }
        let model_name = model_name_from_path(&config.model_path);
        Ok(Self { config, model_name })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Recognizer for WhisperRecognizer {
    fn recognize(&self, samples: &[f32]) -> Result<Vec<RecognizedSpan>> {
        let context = self
            .context
            .lock()
            .map_err(|e| ScribeError::Recognition {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context.create_state().map_err(|e| ScribeError::Recognition {
            message: format!("Failed to create Whisper state: {}", e),
        })?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.config.beam_size as std::os::raw::c_int,
            patience: -1.0,
        });

        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Voice-activity filtering: windows scored above this no-speech
        // probability are dropped by the model instead of hallucinated over.
        params.set_no_speech_thold(self.config.no_speech_threshold);

        // Disable printing to stdout/stderr; transcript lines own stdout.
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| ScribeError::Recognition {
                message: format!("Whisper inference failed: {}", e),
            })?;

        // Segment timestamps are in centiseconds relative to window start.
        let mut spans = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string().trim().to_string();
            if text.is_empty() {
                continue;
            }
            spans.push(RecognizedSpan {
                offset_secs: segment.start_timestamp() as f64 / 100.0,
                text,
            });
        }

        Ok(spans)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl Recognizer for WhisperRecognizer {
    fn recognize(&self, _samples: &[f32]) -> Result<Vec<RecognizedSpan>> {
        Err(ScribeError::Recognition {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
