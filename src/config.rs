// src/config.rs
// Credentials from the environment, external tool paths, and per-job options.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::format::OutputFormat;

pub const DEFAULT_CHUNK_SECS: f64 = 600.0;
pub const DEFAULT_OVERLAP_SECS: f64 = 5.0;
pub const DEFAULT_COMPRESS_BITRATE_KBPS: u32 = 32;

/// API keys for the remote transcription providers.
///
/// Loaded once and passed by reference into the registry; adapters never read
/// the environment themselves.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
}

impl Credentials {
    /// Load credentials from the environment (and a `.env` file if present).
    /// Keys with an unexpected prefix are treated as absent.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let groq = env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| k.starts_with("gsk_"));
        let openai = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| k.starts_with("sk-"));
        let elevenlabs = env::var("ELEVENLABS_API_KEY")
            .ok()
            .filter(|k| k.starts_with("sk_"));

        tracing::info!(
            "Credentials loaded: groq={}, openai={}, elevenlabs={}",
            groq.is_some(),
            openai.is_some(),
            elevenlabs.is_some()
        );

        Self {
            groq_api_key: groq,
            openai_api_key: openai,
            elevenlabs_api_key: elevenlabs,
        }
    }
}

/// Paths to the media inspection and transcoding executables.
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffprobe_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
}

impl MediaTools {
    pub fn from_env() -> Self {
        let ffprobe = env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string());
        let ffmpeg = env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());

        Self {
            ffprobe_bin: PathBuf::from(ffprobe),
            ffmpeg_bin: PathBuf::from(ffmpeg),
        }
    }
}

impl Default for MediaTools {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Per-job options supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Registry id of the provider to use ("groq", "openai", "elevenlabs").
    pub provider: String,
    /// Language hint passed through to the provider.
    pub language: Option<String>,
    /// Model identifier override; each adapter has its own default.
    pub model: Option<String>,
    /// Request speaker labels where the provider supports them.
    pub diarize: bool,
    /// Request word-level timing where the provider supports it.
    pub word_timestamps: bool,
    pub format: OutputFormat,
    /// Logical chunk length for oversized inputs.
    pub chunk_secs: f64,
    /// Extra trailing seconds shared between neighboring chunks.
    pub overlap_secs: f64,
    /// Target bitrate for the single-pass compression fallback.
    pub compress_bitrate_kbps: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            language: None,
            model: None,
            diarize: false,
            word_timestamps: false,
            format: OutputFormat::Text,
            chunk_secs: DEFAULT_CHUNK_SECS,
            overlap_secs: DEFAULT_OVERLAP_SECS,
            compress_bitrate_kbps: DEFAULT_COMPRESS_BITRATE_KBPS,
        }
    }
}
