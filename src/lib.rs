// src/lib.rs
//! Long-form transcription over remote speech-to-text providers.
//!
//! Remote STT services impose hard per-request size ceilings. This crate
//! probes the input, decides between a direct call, a single-pass
//! compression, or an overlapping chunked fan-out, dispatches per the
//! provider's declared concurrency tolerance, and reassembles the per-chunk
//! results into one time-consistent transcript.

pub mod config;
pub mod format;
pub mod media;
pub mod pipeline;
pub mod provider;

pub use config::{Credentials, JobOptions, MediaTools};
pub use format::{render, write_transcript, FormatError, OutputFormat};
pub use media::{ChunkError, ChunkInfo, Chunker, MediaFile, MediaProbe, ProbeError};
pub use pipeline::{JobError, JobFailure, MergeError, Merger, Orchestrator, PipelineStage};
pub use provider::{
    ConcurrencyMode, ProviderAdapter, ProviderCapability, ProviderError, ProviderRegistry,
    RegistryError, RequestOptions, Speaker, TranscriptionResult, TranscriptionSegment,
};

use std::path::Path;
use uuid::Uuid;

/// Transcribe one file with the provider named in `options`.
///
/// Convenience wrapper over the registry and orchestrator; callers that need
/// a custom registry or work root wire those up directly.
pub async fn transcribe_file(
    path: &Path,
    options: &JobOptions,
    credentials: &Credentials,
) -> Result<TranscriptionResult, JobError> {
    let registry = ProviderRegistry::with_defaults();
    let adapter = registry
        .create(&options.provider, credentials)
        .map_err(|e| JobError {
            job_id: Uuid::new_v4().to_string(),
            stage: PipelineStage::Init,
            source: e.into(),
        })?;

    let orchestrator = Orchestrator::new(MediaTools::from_env());
    orchestrator.run_job(path, adapter.as_ref(), options).await
}

/// Transcribe and write the rendered transcript next to the caller-chosen
/// path. The output file is only created after the whole job succeeded.
pub async fn transcribe_to_file(
    path: &Path,
    output: &Path,
    options: &JobOptions,
    credentials: &Credentials,
) -> Result<TranscriptionResult, JobError> {
    let result = transcribe_file(path, options, credentials).await?;

    write_transcript(&result, options.format, output).map_err(|e| JobError {
        job_id: Uuid::new_v4().to_string(),
        stage: PipelineStage::Format,
        source: e.into(),
    })?;

    Ok(result)
}
