// src/format/mod.rs
// Rendering the unified result as prose, subtitle cues, or a structured dump.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::provider::{TranscriptionResult, TranscriptionSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Srt,
    Vtt,
    Json,
}

impl OutputFormat {
    /// Parse a requested format name. An unknown name is normalized to
    /// `Text` rather than failing the job.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "text" | "txt" => OutputFormat::Text,
            "srt" => OutputFormat::Srt,
            "vtt" => OutputFormat::Vtt,
            "json" => OutputFormat::Json,
            other => {
                tracing::debug!("Unknown output format {:?}, falling back to text", other);
                OutputFormat::Text
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to serialize transcript: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render the result in the requested format.
pub fn render(result: &TranscriptionResult, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Text => Ok(render_text(result)),
        OutputFormat::Srt => Ok(render_srt(result)),
        OutputFormat::Vtt => Ok(render_vtt(result)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// Render and write in one shot. Nothing is written unless rendering
/// succeeded, so a failed job never leaves a partial output file.
pub fn write_transcript(
    result: &TranscriptionResult,
    format: OutputFormat,
    path: &Path,
) -> Result<(), FormatError> {
    let rendered = render(result, format)?;
    std::fs::write(path, rendered).map_err(|e| FormatError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Speaker-grouped prose: a `[speaker]` marker is inserted whenever the
/// attributed speaker changes. Without segments, the full text as-is.
fn render_text(result: &TranscriptionResult) -> String {
    let Some(segments) = result.segments.as_ref().filter(|s| !s.is_empty()) else {
        return result.text.clone();
    };

    if segments.iter().all(|s| s.speaker.is_none()) {
        return result.text.clone();
    }

    let mut out = String::new();
    let mut current: Option<&str> = None;

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(speaker) = segment.speaker.as_deref() {
            if current != Some(speaker) {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push('[');
                out.push_str(speaker);
                out.push_str("] ");
                current = Some(speaker);
            } else {
                out.push(' ');
            }
        } else if !out.is_empty() {
            out.push(' ');
        }

        out.push_str(text);
    }

    out
}

fn render_srt(result: &TranscriptionResult) -> String {
    let mut out = String::new();
    for (i, segment) in cue_segments(result).iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            timestamp(segment.start, ','),
            timestamp(segment.end, ','),
            cue_line(segment)
        ));
    }
    out
}

fn render_vtt(result: &TranscriptionResult) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in cue_segments(result) {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            timestamp(segment.start, '.'),
            timestamp(segment.end, '.'),
            cue_line(&segment)
        ));
    }
    out
}

/// Segments for cue output. Without segment data the formats degrade to a
/// single zero-duration cue holding the full text.
fn cue_segments(result: &TranscriptionResult) -> Vec<TranscriptionSegment> {
    match result.segments.as_ref().filter(|s| !s.is_empty()) {
        Some(segments) => segments.clone(),
        None => vec![TranscriptionSegment {
            id: 0,
            start: 0.0,
            end: 0.0,
            text: result.text.clone(),
            speaker: None,
            confidence: None,
        }],
    }
}

fn cue_line(segment: &TranscriptionSegment) -> String {
    let text = segment.text.trim();
    match segment.speaker.as_deref() {
        Some(speaker) => format!("[{}]: {}", speaker, text),
        None => text.to_string(),
    }
}

fn timestamp(secs: f64, millis_sep: char) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{:02}:{:02}:{:02}{}{:03}", hours, mins, s, millis_sep, ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_segments(segments: Vec<TranscriptionSegment>) -> TranscriptionResult {
        TranscriptionResult {
            text: segments
                .iter()
                .map(|s| s.text.clone())
                .collect::<Vec<_>>()
                .join(" "),
            segments: Some(segments),
            speakers: None,
            duration_secs: None,
            language: None,
            provider: "test".to_string(),
            model: "test-model".to_string(),
        }
    }

    fn seg(id: usize, start: f64, end: f64, text: &str) -> TranscriptionSegment {
        TranscriptionSegment {
            id,
            start,
            end,
            text: text.to_string(),
            speaker: None,
            confidence: None,
        }
    }

    #[test]
    fn unknown_format_falls_back_to_text() {
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse(""), OutputFormat::Text);
        assert_eq!(OutputFormat::parse(" SRT "), OutputFormat::Srt);
        assert_eq!(OutputFormat::parse("txt"), OutputFormat::Text);
    }

    #[test]
    fn extensions_match_formats() {
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Vtt.extension(), "vtt");
    }

    #[test]
    fn srt_renders_numbered_cues() {
        let result = result_with_segments(vec![seg(0, 0.0, 2.0, "Hi"), seg(1, 2.0, 5.0, "there")]);
        let srt = render(&result, OutputFormat::Srt).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,000\nHi\n\n2\n00:00:02,000 --> 00:00:05,000\nthere\n\n"
        );
    }

    #[test]
    fn vtt_has_header_and_dot_separator() {
        let result = result_with_segments(vec![seg(0, 61.5, 63.25, "One minute in")]);
        let vtt = render(&result, OutputFormat::Vtt).unwrap();
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:01:01.500 --> 00:01:03.250\nOne minute in\n\n"
        );
    }

    #[test]
    fn missing_segments_degrade_to_single_zero_duration_cue() {
        let result = TranscriptionResult {
            text: "Whole transcript as one cue.".to_string(),
            segments: None,
            speakers: None,
            duration_secs: None,
            language: None,
            provider: "test".to_string(),
            model: "m".to_string(),
        };
        let srt = render(&result, OutputFormat::Srt).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:00,000\nWhole transcript as one cue.\n\n"
        );
    }

    #[test]
    fn speaker_tag_wraps_cue_text() {
        let mut s = seg(0, 0.0, 1.0, "hello");
        s.speaker = Some("speaker_0".to_string());
        let srt = render(&result_with_segments(vec![s]), OutputFormat::Srt).unwrap();
        assert!(srt.contains("[speaker_0]: hello"));
    }

    #[test]
    fn text_inserts_marker_on_speaker_change() {
        let mut a = seg(0, 0.0, 1.0, "first line");
        let mut b = seg(1, 1.0, 2.0, "still first");
        let mut c = seg(2, 2.0, 3.0, "second voice");
        a.speaker = Some("alice".to_string());
        b.speaker = Some("alice".to_string());
        c.speaker = Some("bob".to_string());

        let text = render(&result_with_segments(vec![a, b, c]), OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "[alice] first line still first\n\n[bob] second voice"
        );
    }

    #[test]
    fn text_without_speakers_is_plain_prose() {
        let result = result_with_segments(vec![seg(0, 0.0, 1.0, "a"), seg(1, 1.0, 2.0, "b")]);
        let text = render(&result, OutputFormat::Text).unwrap();
        assert_eq!(text, "a b");
    }

    #[test]
    fn json_round_trips_the_result() {
        let result = result_with_segments(vec![seg(0, 0.0, 2.0, "Hi")]);
        let json = render(&result, OutputFormat::Json).unwrap();
        let parsed: TranscriptionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.text, result.text);
        assert_eq!(parsed.segments.unwrap().len(), 1);
    }

    #[test]
    fn timestamps_roll_over_hours() {
        assert_eq!(timestamp(3661.5, ','), "01:01:01,500");
        assert_eq!(timestamp(0.0, '.'), "00:00:00.000");
    }

    #[test]
    fn write_transcript_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let result = result_with_segments(vec![seg(0, 0.0, 2.0, "Hi")]);

        write_transcript(&result, OutputFormat::Srt, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("1\n00:00:00,000"));
    }
}
