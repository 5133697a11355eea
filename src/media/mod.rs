// src/media/mod.rs
// Media inspection and chunk extraction.

mod chunker;
mod probe;

pub use chunker::{plan_windows, ChunkDir, ChunkError, ChunkInfo, ChunkWindow, Chunker};
pub use probe::{MediaFile, MediaProbe, ProbeError};

/// Container/codec extensions accepted as job input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "m4a", "wav", "flac", "ogg", "oga", "opus", "webm", "mpeg", "mpga", "mov", "mkv",
];
