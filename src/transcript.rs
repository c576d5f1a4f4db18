//! Transcript data model, invariant checks, and timestamp lookup.
//!
//! A `Transcript` is only ever constructed atomically from a completed job
//! or loaded from storage; both paths run the validator before handing it
//! to callers.

use crate::error::{Result, ScribeqError};
use serde::{Deserialize, Serialize};

/// A single spoken word with its timestamps (seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A timestamped unit of transcript text; owns its words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub words: Vec<Word>,
}

/// Complete transcript of one input file. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub language: String,
    pub duration: f64,
}

/// Checks the bound chain `segment.start ≤ word.start ≤ word.end ≤ segment.end`
/// for every word of one segment.
///
/// A violation is reported to the caller, never repaired.
pub fn validate_segment(segment: &Segment) -> Result<()> {
    for (i, word) in segment.words.iter().enumerate() {
        if !(segment.start <= word.start && word.start <= word.end && word.end <= segment.end) {
            return Err(ScribeqError::InvalidTranscript {
                message: format!(
                    "segment {}: word {} ({:?}) [{}, {}] violates segment bounds [{}, {}]",
                    segment.id, i, word.word, word.start, word.end, segment.start, segment.end
                ),
            });
        }
    }
    Ok(())
}

/// Validates a whole transcript: the conjunction of `validate_segment`
/// over all segments.
pub fn validate_transcript(transcript: &Transcript) -> Result<()> {
    for segment in &transcript.segments {
        validate_segment(segment)?;
    }
    Ok(())
}

/// Finds the segment containing timestamp `t` under half-open semantics:
/// `start ≤ t < end`.
///
/// Returns `None` for times before the first segment, at/after the last
/// segment's end, and in gaps between non-adjacent segments. Linear scan;
/// per-file segment counts don't warrant an index.
pub fn find_segment_at(segments: &[Segment], t: f64) -> Option<&Segment> {
    segments.iter().find(|s| s.start <= t && t < s.end)
}

/// Finds the word containing timestamp `t` within one segment, mirroring
/// the half-open rule of [`find_segment_at`].
pub fn find_word_at(segment: &Segment, t: f64) -> Option<&Word> {
    segment.words.iter().find(|w| w.start <= t && t < w.end)
}
