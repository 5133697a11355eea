// src/media/chunker.rs
// Splitting oversized inputs into overlapping time windows, plus the
// single-pass compression fallback.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use crate::config::MediaTools;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("overlap {overlap_secs}s must be shorter than chunk length {chunk_secs}s")]
    InvalidWindow { chunk_secs: f64, overlap_secs: f64 },

    #[error("failed to create chunk directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extraction of chunk {index} failed: {stderr}")]
    Extraction { index: usize, stderr: String },

    #[error("compression failed: {stderr}")]
    Compression { stderr: String },

    #[error("cannot stat chunk file {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Planned time window for one chunk, before any file is written.
///
/// The physical extraction spans `[start_secs, start_secs + span_secs)`; the
/// trimmed logical interval ends at `end_secs`, so trimmed windows partition
/// the source timeline while neighboring files share the overlap tail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindow {
    pub index: usize,
    pub start_secs: f64,
    pub span_secs: f64,
    pub end_secs: f64,
}

/// One materialized chunk file. `end_secs` is the trimmed logical end;
/// `span_secs` is the physical length of the file including the overlap tail.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    pub index: usize,
    pub start_secs: f64,
    pub end_secs: f64,
    pub span_secs: f64,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Compute the chunk windows for a source of the given duration.
///
/// A non-positive step would never terminate, so `overlap_secs` must be
/// strictly shorter than `chunk_secs`. A duration at or under the chunk
/// length yields exactly one window covering the whole file.
pub fn plan_windows(
    duration_secs: f64,
    chunk_secs: f64,
    overlap_secs: f64,
) -> Result<Vec<ChunkWindow>, ChunkError> {
    if chunk_secs <= 0.0 || overlap_secs < 0.0 || overlap_secs >= chunk_secs {
        return Err(ChunkError::InvalidWindow {
            chunk_secs,
            overlap_secs,
        });
    }

    let mut windows = Vec::new();
    let mut start = 0.0f64;
    let mut index = 0usize;

    while start < duration_secs {
        let physical_end = (start + chunk_secs + overlap_secs).min(duration_secs);
        let trimmed_end = (start + chunk_secs).min(duration_secs);

        windows.push(ChunkWindow {
            index,
            start_secs: start,
            span_secs: physical_end - start,
            end_secs: trimmed_end,
        });

        start += chunk_secs;
        index += 1;
    }

    Ok(windows)
}

pub struct Chunker {
    tools: MediaTools,
}

impl Chunker {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Split the source into overlapping chunk files under `out_dir`.
    ///
    /// `duration_secs` comes from the probe; the chunker does not re-inspect
    /// the file. Chunk files keep the source container (stream copy, no
    /// re-encode).
    pub async fn split(
        &self,
        path: &Path,
        duration_secs: f64,
        out_dir: &Path,
        chunk_secs: f64,
        overlap_secs: f64,
    ) -> Result<Vec<ChunkInfo>, ChunkError> {
        let windows = plan_windows(duration_secs, chunk_secs, overlap_secs)?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ChunkError::CreateDir {
                path: out_dir.to_path_buf(),
                source: e,
            })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_string();

        let mut chunks = Vec::with_capacity(windows.len());
        for window in windows {
            let chunk_path = out_dir.join(format!("chunk_{:04}.{}", window.index, ext));
            self.extract(path, &chunk_path, &window).await?;

            let size_bytes = tokio::fs::metadata(&chunk_path)
                .await
                .map_err(|e| ChunkError::Stat {
                    path: chunk_path.clone(),
                    source: e,
                })?
                .len();

            tracing::debug!(
                "Extracted chunk {}: [{:.1}s, {:.1}s) trimmed to {:.1}s, {} bytes",
                window.index,
                window.start_secs,
                window.start_secs + window.span_secs,
                window.end_secs,
                size_bytes
            );

            chunks.push(ChunkInfo {
                index: window.index,
                start_secs: window.start_secs,
                end_secs: window.end_secs,
                span_secs: window.span_secs,
                path: chunk_path,
                size_bytes,
            });
        }

        tracing::info!(
            "Split {} into {} chunks under {}",
            path.display(),
            chunks.len(),
            out_dir.display()
        );

        Ok(chunks)
    }

    async fn extract(
        &self,
        input: &Path,
        output: &Path,
        window: &ChunkWindow,
    ) -> Result<(), ChunkError> {
        let bin = self.tools.ffmpeg_bin.display().to_string();
        let out = Command::new(&self.tools.ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", window.start_secs))
            .arg("-t")
            .arg(format!("{:.3}", window.span_secs))
            .arg("-i")
            .arg(input)
            .arg("-c")
            .arg("copy")
            .arg(output)
            .output()
            .await
            .map_err(|e| ChunkError::Spawn { bin, source: e })?;

        if !out.status.success() {
            return Err(ChunkError::Extraction {
                index: window.index,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    /// Single-pass re-encode used when compressing under the ceiling is
    /// cheaper than chunking: mono, low-bitrate Opus, metadata stripped.
    pub async fn compress(
        &self,
        path: &Path,
        out_path: &Path,
        bitrate_kbps: u32,
    ) -> Result<PathBuf, ChunkError> {
        let bin = self.tools.ffmpeg_bin.display().to_string();
        let out = Command::new(&self.tools.ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(path)
            .arg("-vn")
            .arg("-ac")
            .arg("1")
            .arg("-map_metadata")
            .arg("-1")
            .arg("-c:a")
            .arg("libopus")
            .arg("-b:a")
            .arg(format!("{}k", bitrate_kbps))
            .arg(out_path)
            .output()
            .await
            .map_err(|e| ChunkError::Spawn { bin, source: e })?;

        if !out.status.success() {
            return Err(ChunkError::Compression {
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        tracing::info!(
            "Compressed {} -> {} at {}kbps",
            path.display(),
            out_path.display(),
            bitrate_kbps
        );

        Ok(out_path.to_path_buf())
    }

    /// Best-effort recursive delete of a chunk directory. Never raises;
    /// a directory that was never created counts as already cleaned.
    pub fn cleanup(dir: &Path) {
        if !dir.exists() {
            return;
        }

        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Failed to remove chunk dir {}: {}", dir.display(), e);
        } else {
            tracing::debug!("Removed chunk dir {}", dir.display());
        }
    }
}

/// Owns a job-scoped chunk directory and releases it on drop, so every exit
/// path of the chunked branch triggers the same cleanup.
pub struct ChunkDir {
    path: PathBuf,
}

impl ChunkDir {
    /// The directory is named after the job id and is not created here;
    /// `Chunker::split` creates it on first use.
    pub fn new(work_root: &Path, job_id: &str) -> Self {
        Self {
            path: work_root.join(format!("chunks-{}", job_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ChunkDir {
    fn drop(&mut self) {
        Chunker::cleanup(&self.path);
    }
}
