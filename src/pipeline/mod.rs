// src/pipeline/mod.rs
// Orchestrator: drives size-check -> (direct | compress -> direct | chunked
// fan-out) -> merge, with job-scoped cleanup on every exit.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub mod merge;

pub use merge::{MergeError, Merger};

use crate::config::{JobOptions, MediaTools};
use crate::format::FormatError;
use crate::media::{ChunkDir, ChunkError, ChunkInfo, Chunker, MediaProbe, ProbeError};
use crate::provider::{
    ConcurrencyMode, ProviderAdapter, ProviderError, RegistryError, RequestOptions,
    TranscriptionResult, TranscriptionSegment,
};

/// Minimum per-call timeout; short chunks still get this much.
const MIN_CALL_TIMEOUT_SECS: f64 = 60.0;
/// Per-call timeout as a multiple of the audio duration being sent.
const CALL_TIMEOUT_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    Probe,
    SizeCheck,
    Compress,
    Split,
    Transcribe,
    Merge,
    Format,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::Probe => "probe",
            PipelineStage::SizeCheck => "size check",
            PipelineStage::Compress => "compress",
            PipelineStage::Split => "split",
            PipelineStage::Transcribe => "transcribe",
            PipelineStage::Merge => "merge",
            PipelineStage::Format => "format",
        };
        f.write_str(name)
    }
}

/// Whole-job failure, wrapped with the job id and the stage that failed.
/// Partial transcripts are never surfaced alongside one of these.
#[derive(Debug, thiserror::Error)]
#[error("job {job_id} failed during {stage}: {source}")]
pub struct JobError {
    pub job_id: String,
    pub stage: PipelineStage,
    #[source]
    pub source: JobFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn fail(job_id: &str, stage: PipelineStage, source: impl Into<JobFailure>) -> JobError {
    JobError {
        job_id: job_id.to_string(),
        stage,
        source: source.into(),
    }
}

/// Removes the compression artifact when the job is done with it,
/// success or failure.
struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove compression artifact {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

pub struct Orchestrator {
    probe: MediaProbe,
    chunker: Chunker,
    work_root: PathBuf,
}

impl Orchestrator {
    pub fn new(tools: MediaTools) -> Self {
        Self {
            probe: MediaProbe::new(tools.clone()),
            chunker: Chunker::new(tools),
            work_root: std::env::temp_dir(),
        }
    }

    /// Where compression artifacts and chunk directories live. Each job uses
    /// a subdirectory or file name carrying its job id.
    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    /// Run one transcription job against the given adapter.
    pub async fn run_job(
        &self,
        path: &Path,
        adapter: &dyn ProviderAdapter,
        options: &JobOptions,
    ) -> Result<TranscriptionResult, JobError> {
        let job_id = Uuid::new_v4().to_string();
        let capability = adapter.capability();

        let media = self
            .probe
            .probe(path)
            .await
            .map_err(|e| fail(&job_id, PipelineStage::Probe, e))?;

        tracing::info!(
            "Job {}: {} via {} ({} bytes, {:.1}s, ceiling {} bytes)",
            job_id,
            path.display(),
            capability.name,
            media.size_bytes,
            media.duration_secs,
            capability.max_input_bytes
        );

        let request = request_options(options, capability.diarization);

        // Direct path: the whole file fits under the ceiling.
        if media.size_bytes <= capability.max_input_bytes {
            let mut result = self
                .call_with_timeout(adapter, path, &request, media.duration_secs)
                .await
                .map_err(|e| fail(&job_id, PipelineStage::Transcribe, e))?;
            result.duration_secs = result.duration_secs.or(Some(media.duration_secs));
            return Ok(result);
        }

        // Compression fallback: one cheap re-encode can beat chunking.
        let mut source_path = path.to_path_buf();
        let mut _artifact: Option<TempArtifact> = None;

        if capability.compress_fallback {
            let out_path = self.work_root.join(format!("compressed-{}.ogg", job_id));
            self.chunker
                .compress(path, &out_path, options.compress_bitrate_kbps)
                .await
                .map_err(|e| fail(&job_id, PipelineStage::Compress, e))?;
            let artifact = TempArtifact::new(out_path);

            let compressed_size = self
                .probe
                .size(artifact.path())
                .await
                .map_err(|e| fail(&job_id, PipelineStage::SizeCheck, e))?;

            if compressed_size <= capability.max_input_bytes {
                tracing::info!(
                    "Job {}: compressed to {} bytes, under ceiling; direct call",
                    job_id,
                    compressed_size
                );
                let mut result = self
                    .call_with_timeout(adapter, artifact.path(), &request, media.duration_secs)
                    .await
                    .map_err(|e| fail(&job_id, PipelineStage::Transcribe, e))?;
                result.duration_secs = result.duration_secs.or(Some(media.duration_secs));
                return Ok(result);
            }

            tracing::info!(
                "Job {}: compressed to {} bytes, still over ceiling; chunking the artifact",
                job_id,
                compressed_size
            );
            source_path = artifact.path().to_path_buf();
            _artifact = Some(artifact);
        }

        // Chunked path. The guard owns the directory for the rest of the
        // job, so provider and merge failures release it the same way
        // success does.
        let chunk_dir = ChunkDir::new(&self.work_root, &job_id);
        let chunks = self
            .chunker
            .split(
                &source_path,
                media.duration_secs,
                chunk_dir.path(),
                options.chunk_secs,
                options.overlap_secs,
            )
            .await
            .map_err(|e| fail(&job_id, PipelineStage::Split, e))?;

        let results = match capability.concurrency {
            ConcurrencyMode::Parallel => self.dispatch_parallel(adapter, &chunks, &request).await,
            ConcurrencyMode::Sequential => {
                self.dispatch_sequential(adapter, &chunks, &request).await
            }
        }
        .map_err(|e| fail(&job_id, PipelineStage::Transcribe, e))?;

        let merged = merge_results(&chunks, &results, &media, capability.name)
            .map_err(|e| fail(&job_id, PipelineStage::Merge, e))?;

        tracing::info!(
            "Job {}: merged {} chunks into {} chars",
            job_id,
            chunks.len(),
            merged.text.len()
        );

        Ok(merged)
    }

    /// Issue every chunk call at once and wait for all of them. Completion
    /// order is never assumed to be dispatch order, so results are re-sorted
    /// by chunk index before use. Any failure discards the rest.
    async fn dispatch_parallel(
        &self,
        adapter: &dyn ProviderAdapter,
        chunks: &[ChunkInfo],
        request: &RequestOptions,
    ) -> Result<Vec<TranscriptionResult>, ProviderError> {
        let calls = chunks.iter().map(|chunk| {
            async move {
                let outcome = self
                    .call_with_timeout(adapter, &chunk.path, request, chunk.span_secs)
                    .await;
                (chunk.index, outcome)
            }
        });

        let mut outcomes = join_all(calls).await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut results = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Chunk {} failed, aborting job: {}", index, e);
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    /// One call in flight at a time, strictly in chunk index order. A failure
    /// stops scheduling further chunks.
    async fn dispatch_sequential(
        &self,
        adapter: &dyn ProviderAdapter,
        chunks: &[ChunkInfo],
        request: &RequestOptions,
    ) -> Result<Vec<TranscriptionResult>, ProviderError> {
        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            tracing::debug!("Dispatching chunk {} sequentially", chunk.index);
            let result = self
                .call_with_timeout(adapter, &chunk.path, request, chunk.span_secs)
                .await
                .map_err(|e| {
                    tracing::error!("Chunk {} failed, aborting job: {}", chunk.index, e);
                    e
                })?;
            results.push(result);
        }
        Ok(results)
    }

    /// One provider call with a deadline scaled to the audio duration being
    /// sent. A deadline miss surfaces as the timeout error kind, never as a
    /// silent retry.
    async fn call_with_timeout(
        &self,
        adapter: &dyn ProviderAdapter,
        unit_path: &Path,
        request: &RequestOptions,
        audio_secs: f64,
    ) -> Result<TranscriptionResult, ProviderError> {
        let timeout = Duration::from_secs_f64(
            (audio_secs * CALL_TIMEOUT_FACTOR).max(MIN_CALL_TIMEOUT_SECS),
        );

        match tokio::time::timeout(timeout, adapter.transcribe(unit_path, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }
}

fn request_options(options: &JobOptions, provider_diarizes: bool) -> RequestOptions {
    RequestOptions {
        language: options.language.clone(),
        model: options.model.clone(),
        diarize: options.diarize && provider_diarizes,
        word_timestamps: options.word_timestamps,
    }
}

/// Fold ordered per-chunk results into the job-level result.
fn merge_results(
    chunks: &[ChunkInfo],
    results: &[TranscriptionResult],
    media: &crate::media::MediaFile,
    provider: &str,
) -> Result<TranscriptionResult, MergeError> {
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    let text = Merger::merge_text(&texts);

    // Merge segments only when every chunk produced them; a partial segment
    // timeline would misrepresent the job.
    let segments = if results.iter().all(|r| r.segments.is_some()) && !results.is_empty() {
        let batches: Vec<Vec<TranscriptionSegment>> = results
            .iter()
            .map(|r| r.segments.clone().unwrap_or_default())
            .collect();
        let starts: Vec<f64> = chunks.iter().map(|c| c.start_secs).collect();
        Some(Merger::merge_segments(&batches, &starts)?)
    } else {
        None
    };

    let speakers = segments.as_deref().and_then(Merger::rebuild_speakers);
    let language = results.iter().find_map(|r| r.language.clone());
    let model = results
        .first()
        .map(|r| r.model.clone())
        .unwrap_or_default();

    Ok(TranscriptionResult {
        text,
        segments,
        speakers,
        duration_secs: Some(media.duration_secs),
        language,
        provider: provider.to_string(),
        model,
    })
}
