// src/provider/elevenlabs.rs
// ElevenLabs Scribe adapter: small ceiling, single-flight only, speaker
// diarization via word-level records.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{
    read_unit, upload_meta, ConcurrencyMode, ProviderAdapter, ProviderCapability, ProviderError,
    RequestOptions, TranscriptionResult, TranscriptionSegment,
};

const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";
const DEFAULT_MODEL: &str = "scribe_v1";
const CLIENT_TIMEOUT_SECS: u64 = 600;

static CAPABILITY: ProviderCapability = ProviderCapability {
    name: "elevenlabs",
    max_input_bytes: 10 * 1024 * 1024,
    concurrency: ConcurrencyMode::Sequential,
    diarization: true,
    compress_fallback: true,
};

#[derive(Debug, Deserialize)]
struct ScribeResponse {
    text: String,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    words: Vec<ScribeWord>,
}

#[derive(Debug, Deserialize)]
struct ScribeWord {
    text: String,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    speaker_id: Option<String>,
}

pub struct ElevenLabsAdapter {
    api_key: String,
    client: reqwest::Client,
}

impl ElevenLabsAdapter {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        tracing::info!("ElevenLabs adapter initialized");

        Ok(Self { api_key, client })
    }

    /// Fold word records into segments, starting a new segment whenever the
    /// attributed speaker changes. Words without timing extend the current
    /// segment's text only.
    fn words_to_segments(words: &[ScribeWord]) -> Vec<TranscriptionSegment> {
        let mut segments: Vec<TranscriptionSegment> = Vec::new();

        for word in words {
            let text = word.text.trim();
            if text.is_empty() {
                continue;
            }

            let same_speaker = segments
                .last()
                .map(|s| s.speaker == word.speaker_id)
                .unwrap_or(false);

            if same_speaker {
                let current = segments.last_mut().expect("guarded by same_speaker");
                if !current.text.is_empty() {
                    current.text.push(' ');
                }
                current.text.push_str(text);
                if let Some(end) = word.end {
                    current.end = end;
                }
            } else {
                let start = word.start.unwrap_or_else(|| {
                    segments.last().map(|s| s.end).unwrap_or(0.0)
                });
                segments.push(TranscriptionSegment {
                    id: segments.len(),
                    start,
                    end: word.end.unwrap_or(start),
                    text: text.to_string(),
                    speaker: word.speaker_id.clone(),
                    confidence: None,
                });
            }
        }

        segments
    }
}

#[async_trait]
impl ProviderAdapter for ElevenLabsAdapter {
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
            "ElevenLabs: transcribing {} ({} bytes)",
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
            .text("model_id", model.clone())
            .part("file", file_part);

        if options.diarize {
            form = form.text("diarize", "true");
        }
        if let Some(lang) = &options.language {
            form = form.text("language_code", lang.clone());
        }

        let response = self
            .client
            .post(ELEVENLABS_API_URL)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let body: ScribeResponse = resp
                        .json()
                        .await
                        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

                    let segments = Self::words_to_segments(&body.words);
                    let duration = segments.last().map(|s| s.end);

                    Ok(TranscriptionResult {
                        text: body.text,
                        segments: if segments.is_empty() {
                            None
                        } else {
                            Some(segments)
                        },
                        speakers: None,
                        duration_secs: duration,
                        language: body.language_code,
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

    fn word(text: &str, start: f64, end: f64, speaker: Option<&str>) -> ScribeWord {
        ScribeWord {
            text: text.to_string(),
            start: Some(start),
            end: Some(end),
            speaker_id: speaker.map(|s| s.to_string()),
        }
    }

    #[test]
    fn groups_words_by_speaker_change() {
        let words = vec![
            word("hello", 0.0, 0.4, Some("speaker_0")),
            word("there", 0.5, 0.9, Some("speaker_0")),
            word("hi", 1.2, 1.4, Some("speaker_1")),
            word("back", 1.5, 1.8, Some("speaker_0")),
        ];

        let segments = ElevenLabsAdapter::words_to_segments(&words);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "hello there");
        assert_eq!(segments[0].speaker.as_deref(), Some("speaker_0"));
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 0.9);
        assert_eq!(segments[1].text, "hi");
        assert_eq!(segments[1].speaker.as_deref(), Some("speaker_1"));
        assert_eq!(segments[2].text, "back");
        assert_eq!(segments[2].id, 2);
    }

    #[test]
    fn undiarized_words_form_one_segment() {
        let words = vec![
            word("just", 0.0, 0.2, None),
            word("one", 0.3, 0.5, None),
            word("voice", 0.6, 0.9, None),
        ];

        let segments = ElevenLabsAdapter::words_to_segments(&words);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just one voice");
        assert_eq!(segments[0].end, 0.9);
        assert!(segments[0].speaker.is_none());
    }

    #[test]
    fn blank_words_are_skipped() {
        let words = vec![word("  ", 0.0, 0.1, None), word("ok", 0.2, 0.3, None)];
        let segments = ElevenLabsAdapter::words_to_segments(&words);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "ok");
        assert_eq!(segments[0].start, 0.2);
    }
}
