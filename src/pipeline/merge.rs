// src/pipeline/merge.rs
// Stitching per-chunk transcripts back into one result: boundary dedup for
// text, timestamp offsets for segments.

use thiserror::Error;

use crate::provider::{Speaker, TranscriptionSegment};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("segment batch count {batches} does not match chunk start count {starts}")]
    StartTimeMismatch { batches: usize, starts: usize },
}

pub struct Merger;

impl Merger {
    /// Join chunk texts, dropping each later chunk's leading sentence when it
    /// has more than one; the lead is assumed to duplicate the previous
    /// chunk's overlap tail. A single chunk is returned unchanged.
    ///
    /// The heuristic is approximate: a chunk whose first sentence is genuine
    /// new content loses it, and a duplicated fragment without sentence
    /// punctuation survives. Accepted trade-off at this layer.
    pub fn merge_text(chunk_texts: &[&str]) -> String {
        let Some((first, rest)) = chunk_texts.split_first() else {
            return String::new();
        };

        let mut merged = (*first).to_string();

        for text in rest {
            let kept = drop_leading_sentence(text);
            if kept.is_empty() {
                continue;
            }
            if !merged.is_empty() {
                merged.push_str("\n\n");
            }
            merged.push_str(&kept);
        }

        merged
    }

    /// Shift each chunk's segments by that chunk's start time, concatenate in
    /// chunk order, and renumber ids to `0..N-1`. Time-sorted by construction
    /// since chunks arrive in index order with locally sorted segments.
    pub fn merge_segments(
        chunk_segments: &[Vec<TranscriptionSegment>],
        chunk_starts: &[f64],
    ) -> Result<Vec<TranscriptionSegment>, MergeError> {
        if chunk_segments.len() != chunk_starts.len() {
            return Err(MergeError::StartTimeMismatch {
                batches: chunk_segments.len(),
                starts: chunk_starts.len(),
            });
        }

        let mut merged = Vec::new();
        for (segments, &offset) in chunk_segments.iter().zip(chunk_starts) {
            for segment in segments {
                merged.push(TranscriptionSegment {
                    id: merged.len(),
                    start: segment.start + offset,
                    end: segment.end + offset,
                    text: segment.text.clone(),
                    speaker: segment.speaker.clone(),
                    confidence: segment.confidence,
                });
            }
        }

        Ok(merged)
    }

    /// Rebuild the speaker list from merged segments, in first-appearance
    /// order, so `segment_ids` reference the renumbered ids.
    pub fn rebuild_speakers(segments: &[TranscriptionSegment]) -> Option<Vec<Speaker>> {
        let mut speakers: Vec<Speaker> = Vec::new();

        for segment in segments {
            let Some(speaker_id) = &segment.speaker else {
                continue;
            };

            match speakers.iter_mut().find(|s| &s.id == speaker_id) {
                Some(speaker) => speaker.segment_ids.push(segment.id),
                None => speakers.push(Speaker {
                    id: speaker_id.clone(),
                    name: None,
                    segment_ids: vec![segment.id],
                }),
            }
        }

        if speakers.is_empty() {
            None
        } else {
            Some(speakers)
        }
    }
}

/// Split on `.`/`!`/`?` boundaries; if more than one sentence resulted, drop
/// the first, otherwise keep the text unchanged.
fn drop_leading_sentence(text: &str) -> String {
    let sentences = split_sentences(text);
    if sentences.len() > 1 {
        sentences[1..].join(" ").trim().to_string()
    } else {
        text.trim().to_string()
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn single_chunk_is_identity() {
        let text = "One sentence. Another sentence. And a third!";
        assert_eq!(Merger::merge_text(&[text]), text);
    }

    #[test]
    fn single_sentence_chunks_are_concatenated_whole() {
        let merged = Merger::merge_text(&["First thought.", "Second thought."]);
        assert_eq!(merged, "First thought.\n\nSecond thought.");
    }

    #[test]
    fn later_chunks_lose_their_leading_sentence() {
        let merged = Merger::merge_text(&[
            "Intro stays whole. Tail of chunk zero.",
            "Tail of chunk zero. New material here. More new material.",
        ]);
        assert_eq!(
            merged,
            "Intro stays whole. Tail of chunk zero.\n\nNew material here. More new material."
        );
    }

    #[test]
    fn empty_input_merges_to_empty() {
        assert_eq!(Merger::merge_text(&[]), "");
    }

    #[test]
    fn segments_are_shifted_by_chunk_start() {
        let chunks = vec![
            vec![seg(0, 0.0, 2.0, "a"), seg(1, 2.0, 4.0, "b")],
            vec![seg(0, 0.0, 3.0, "c")],
            vec![seg(0, 1.0, 2.0, "d")],
        ];
        let starts = [0.0, 30.0, 60.0];

        let merged = Merger::merge_segments(&chunks, &starts).unwrap();

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[2].start, 30.0);
        assert_eq!(merged[2].end, 33.0);
        assert_eq!(merged[3].start, 61.0);

        for (i, segment) in merged.iter().enumerate() {
            assert_eq!(segment.id, i, "ids renumbered to a contiguous range");
        }
        for pair in merged.windows(2) {
            assert!(pair[1].start >= pair[0].start, "sorted ascending by start");
        }
    }

    #[test]
    fn start_time_mismatch_is_rejected() {
        let chunks = vec![vec![seg(0, 0.0, 1.0, "a")]];
        let err = Merger::merge_segments(&chunks, &[0.0, 30.0]).unwrap_err();
        assert!(matches!(err, MergeError::StartTimeMismatch { .. }));
    }

    #[test]
    fn speakers_rebuilt_in_first_appearance_order() {
        let mut segments = vec![
            seg(0, 0.0, 1.0, "a"),
            seg(1, 1.0, 2.0, "b"),
            seg(2, 2.0, 3.0, "c"),
        ];
        segments[0].speaker = Some("speaker_1".to_string());
        segments[1].speaker = Some("speaker_0".to_string());
        segments[2].speaker = Some("speaker_1".to_string());

        let speakers = Merger::rebuild_speakers(&segments).unwrap();

        assert_eq!(speakers.len(), 2);
        assert_eq!(speakers[0].id, "speaker_1");
        assert_eq!(speakers[0].segment_ids, vec![0, 2]);
        assert_eq!(speakers[1].id, "speaker_0");
        assert_eq!(speakers[1].segment_ids, vec![1]);
    }

    #[test]
    fn no_speakers_yields_none() {
        let segments = vec![seg(0, 0.0, 1.0, "a")];
        assert!(Merger::rebuild_speakers(&segments).is_none());
    }
}
