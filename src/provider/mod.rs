// src/provider/mod.rs
// Provider adapters: one per remote speech-to-text service.

mod elevenlabs;
mod groq;
mod openai;
mod registry;
mod types;

pub use elevenlabs::ElevenLabsAdapter;
pub use groq::GroqAdapter;
pub use openai::OpenAiAdapter;
pub use registry::{AdapterFactory, ProviderRegistry, RegistryError};
pub use types::{ProviderError, Speaker, TranscriptionResult, TranscriptionSegment};

use async_trait::async_trait;
use std::path::Path;

/// Whether a provider tolerates concurrent in-flight requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    Parallel,
    Sequential,
}

/// Static description of what one provider can accept. Dispatch decisions
/// key off this descriptor, never off the provider's name.
#[derive(Debug, Clone)]
pub struct ProviderCapability {
    pub name: &'static str,
    pub max_input_bytes: u64,
    pub concurrency: ConcurrencyMode,
    pub diarization: bool,
    /// Whether a single-pass compression is worth trying before chunking.
    pub compress_fallback: bool,
}

/// Per-request options forwarded to the provider.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub language: Option<String>,
    pub model: Option<String>,
    pub diarize: bool,
    pub word_timestamps: bool,
}

/// One stateless call per unit of work. The adapter rejects oversized input
/// and never splits it; chunking belongs to the orchestrator.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn capability(&self) -> &ProviderCapability;

    async fn transcribe(
        &self,
        unit_path: &Path,
        options: &RequestOptions,
    ) -> Result<TranscriptionResult, ProviderError>;
}

/// Read one unit of work, enforcing the adapter's input ceiling first.
pub(crate) async fn read_unit(
    path: &Path,
    capability: &ProviderCapability,
) -> Result<Vec<u8>, ProviderError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ProviderError::InputRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    if meta.len() > capability.max_input_bytes {
        return Err(ProviderError::OversizedInput {
            size_bytes: meta.len(),
            max_input_bytes: capability.max_input_bytes,
        });
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::InputRead {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Multipart file name and MIME type for the upload.
pub(crate) fn upload_meta(path: &Path) -> (String, &'static str) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.mp3")
        .to_string();

    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp4") | Some("m4a") | Some("mov") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
        Some("webm") | Some("mkv") => "audio/webm",
        _ => "audio/mpeg",
    };

    (name, mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn read_unit_rejects_oversized_input() {
        let capability = ProviderCapability {
            name: "test",
            max_input_bytes: 4,
            concurrency: ConcurrencyMode::Parallel,
            diarization: false,
            compress_fallback: false,
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let err = read_unit(file.path(), &capability).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::OversizedInput {
                size_bytes: 10,
                max_input_bytes: 4
            }
        ));
    }

    #[tokio::test]
    async fn read_unit_accepts_input_at_the_ceiling() {
        let capability = ProviderCapability {
            name: "test",
            max_input_bytes: 10,
            concurrency: ConcurrencyMode::Parallel,
            diarization: false,
            compress_fallback: false,
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let bytes = read_unit(file.path(), &capability).await.unwrap();
        assert_eq!(bytes, b"0123456789");
    }

    #[test]
    fn upload_meta_maps_extensions() {
        let (name, mime) = upload_meta(Path::new("/tmp/x/talk.wav"));
        assert_eq!(name, "talk.wav");
        assert_eq!(mime, "audio/wav");

        let (_, mime) = upload_meta(Path::new("clip.opus"));
        assert_eq!(mime, "audio/ogg");

        let (_, mime) = upload_meta(Path::new("episode.mp3"));
        assert_eq!(mime, "audio/mpeg");
    }
}
