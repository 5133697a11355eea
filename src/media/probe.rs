// src/media/probe.rs
// Duration and size inspection via the ffprobe subprocess.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

use super::SUPPORTED_EXTENSIONS;
use crate::config::MediaTools;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{bin} failed on {path}: {stderr}")]
    Inspection {
        bin: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("unparsable duration {raw:?} for {path}")]
    BadDuration { raw: String, path: PathBuf },

    #[error("cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported media extension {ext:?}")]
    UnsupportedExtension { ext: String },
}

/// Read-only facts about the source file, computed once at job start.
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub extension: String,
}

pub struct MediaProbe {
    tools: MediaTools,
}

impl MediaProbe {
    pub fn new(tools: MediaTools) -> Self {
        Self { tools }
    }

    /// Source duration in seconds, from ffprobe's format section.
    pub async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let bin = self.tools.ffprobe_bin.display().to_string();
        let output = Command::new(&self.tools.ffprobe_bin)
            .arg("-i")
            .arg(path)
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-v")
            .arg("quiet")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .output()
            .await
            .map_err(|e| ProbeError::Spawn {
                bin: bin.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Inspection {
                bin,
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_duration_output(&raw).ok_or_else(|| ProbeError::BadDuration {
            raw: raw.trim().to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Byte size from a filesystem stat.
    pub async fn size(&self, path: &Path) -> Result<u64, ProbeError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ProbeError::Stat {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(meta.len())
    }

    pub async fn exceeds_ceiling(&self, path: &Path, ceiling_bytes: u64) -> Result<bool, ProbeError> {
        Ok(self.size(path).await? > ceiling_bytes)
    }

    /// Full inspection: extension check, duration, size.
    pub async fn probe(&self, path: &Path) -> Result<MediaFile, ProbeError> {
        let extension = validate_extension(path)?;
        let duration_secs = self.duration(path).await?;
        let size_bytes = self.size(path).await?;

        tracing::debug!(
            "Probed {}: {:.1}s, {} bytes",
            path.display(),
            duration_secs,
            size_bytes
        );

        Ok(MediaFile {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            extension,
        })
    }
}

fn parse_duration_output(raw: &str) -> Option<f64> {
    let secs: f64 = raw.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(secs)
    } else {
        None
    }
}

fn validate_extension(path: &Path) -> Result<String, ProbeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ProbeError::UnsupportedExtension { ext })
    }
}
