// src/provider/groq.rs
// Groq Whisper adapter: large ceiling, safe to fan out concurrently.

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::{
    read_unit, upload_meta, ConcurrencyMode, ProviderAdapter, ProviderCapability, ProviderError,
    RequestOptions, TranscriptionResult, TranscriptionSegment,
};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const DEFAULT_MODEL: &str = "whisper-large-v3";
const CLIENT_TIMEOUT_SECS: u64 = 300;

static CAPABILITY: ProviderCapability = ProviderCapability {
    name: "groq",
    max_input_bytes: 25 * 1024 * 1024,
    concurrency: ConcurrencyMode::Parallel,
    diarization: false,
    compress_fallback: false,
};

#[derive(Debug, Deserialize)]
struct GroqResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<GroqSegment>,
}

#[derive(Debug, Deserialize)]
struct GroqSegment {
    start: f64,
    end: f64,
    text: String,
}

pub struct GroqAdapter {
    api_key: String,
    client: reqwest::Client,
}

impl GroqAdapter {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        tracing::info!("Groq adapter initialized");

        Ok(Self { api_key, client })
    }

    /// Whisper occasionally leaks inline `[00:12]`-style markers into the
    /// text field; strip them and collapse the whitespace left behind.
    fn clean_transcript(text: &str) -> String {
        static TS_RE: OnceLock<Regex> = OnceLock::new();
        let re = TS_RE.get_or_init(|| {
            Regex::new(r"\[\d{2}:\d{2}.*?\]|\(\d{2}:\d{2}\)").expect("valid timestamp regex")
        });
        let stripped = re.replace_all(text, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl ProviderAdapter for GroqAdapter {
    fn capability(&self) -> &ProviderCapability {
        &CAPABILITY
    }

    async fn transcribe(
        &self,
        unit_path: &Path,
        options: &RequestOptions,
    ) -> Result<TranscriptionResult, ProviderError> {
        let bytes = read_unit(unit_path, &CAPABILITY).await?;
        let (file_name, mime) = upload_meta(unit_path);

        tracing::info!(
            "Groq: transcribing {} ({} bytes)",
            unit_path.display(),
            bytes.len()
        );

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let mut form = multipart::Form::new()
            .text("model", model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        if let Some(lang) = &options.language {
            form = form.text("language", lang.clone());
        }
        if options.word_timestamps {
            form = form.text("timestamp_granularities[]", "segment");
        }

        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let body: GroqResponse = resp
                        .json()
                        .await
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

                    let segments: Vec<TranscriptionSegment> = body
                        .segments
                        .into_iter()
                        .enumerate()
                        .map(|(id, s)| TranscriptionSegment {
                            id,
                            start: s.start,
                            end: s.end,
                            text: s.text.trim().to_string(),
                            speaker: None,
                            confidence: None,
                        })
                        .collect();

                    Ok(TranscriptionResult {
                        text: Self::clean_transcript(&body.text),
                        segments: if segments.is_empty() {
                            None
                        } else {
                            Some(segments)
                        },
                        speakers: None,
                        duration_secs: body.duration,
                        language: body.language,
                        provider: CAPABILITY.name.to_string(),
                        model,
                    })
                } else if status.as_u16() == 401 {
                    Err(ProviderError::Auth)
                } else if status.as_u16() == 429 {
                    Err(ProviderError::RateLimited)
                } else {
                    let message = resp.text().await.unwrap_or_default();
                    Err(ProviderError::Http {
                        provider: CAPABILITY.name.to_string(),
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(ProviderError::Timeout)
                } else {
                    Err(ProviderError::Network(e.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_inline_timestamp_markers() {
        let raw = "[00:01] hello there (00:05)  general   kenobi";
        assert_eq!(
            GroqAdapter::clean_transcript(raw),
            "hello there general kenobi"
        );
    }

    #[test]
    fn clean_transcript_is_identity_on_plain_text() {
        assert_eq!(
            GroqAdapter::clean_transcript("plain sentence."),
            "plain sentence."
        );
    }
}
