// src/provider/openai.rs
// OpenAI Whisper adapter. Same wire shape as Groq's OpenAI-compatible
// endpoint, with its own base URL, model default, and ceiling.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{
    read_unit, upload_meta, ConcurrencyMode, ProviderAdapter, ProviderCapability, ProviderError,
    RequestOptions, TranscriptionResult, TranscriptionSegment,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEFAULT_MODEL: &str = "whisper-1";
const CLIENT_TIMEOUT_SECS: u64 = 600;

static CAPABILITY: ProviderCapability = ProviderCapability {
    name: "openai",
    max_input_bytes: 25 * 1024 * 1024,
    concurrency: ConcurrencyMode::Parallel,
    diarization: false,
    compress_fallback: false,
};

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<OpenAiSegment>,
}

#[derive(Debug, Deserialize)]
struct OpenAiSegment {
    start: f64,
    end: f64,
    text: String,
}

pub struct OpenAiAdapter {
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        tracing::info!("OpenAI adapter initialized");

        Ok(Self { api_key, client })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
            "OpenAI: transcribing {} ({} bytes)",
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

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let body: OpenAiResponse = resp
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
                        text: body.text,
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
