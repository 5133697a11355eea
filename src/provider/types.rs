// src/provider/types.rs
// Result data model and provider error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timestamped span of transcript text. Times are chunk-local until the
/// merger shifts them; after merge, ids are contiguous and time-ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub id: usize,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A speaker detected by a diarization-capable provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Segment ids attributed to this speaker, in transcript order.
    pub segment_ids: Vec<usize>,
}

/// Unified transcription result from any provider, for one unit of work
/// (a whole file or a single chunk) or, after merging, for the whole job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<TranscriptionSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speakers: Option<Vec<Speaker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub provider: String,
    pub model: String,
}

/// Provider call failures, classified for the caller's retry policy.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("authentication failed")]
    Auth,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("unparsable provider response: {0}")]
    InvalidResponse(String),

    #[error("input of {size_bytes} bytes exceeds the {max_input_bytes} byte ceiling")]
    OversizedInput {
        size_bytes: u64,
        max_input_bytes: u64,
    },

    #[error("cannot read input {path}: {source}")]
    InputRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    /// True for failures a caller-side retry could plausibly clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Timeout | ProviderError::RateLimited
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(ProviderError::RateLimited.is_transient());

        assert!(!ProviderError::Auth.is_transient());
        assert!(!ProviderError::OversizedInput {
            size_bytes: 10,
            max_input_bytes: 5
        }
        .is_transient());
        assert!(!ProviderError::Http {
            provider: "groq".into(),
            status: 500,
            message: String::new()
        }
        .is_transient());
    }
}
