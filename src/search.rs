//! Case-insensitive substring search over a transcript.

use crate::transcript::Segment;
use serde::{Deserialize, Serialize};

/// One occurrence of the query inside a word (or a segment's raw text when
/// the segment carries no word-level data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub segment_id: String,
    pub segment_index: usize,
    /// `None` when the match came from the segment-text fallback.
    pub word_index: Option<usize>,
    /// The string the match was found in.
    pub text: String,
    /// Character offset of the match within `text`.
    pub start: usize,
    /// Exclusive character offset of the match end.
    pub end: usize,
}

/// Lowercases per character, keeping offsets aligned with the source.
fn fold_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// All occurrences of `needle` in `haystack`, checking every starting
/// position so overlapping occurrences are found. This keeps
/// single-character highlighting accurate.
fn occurrences(haystack: &[char], needle: &[char]) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return found;
    }
    for i in 0..=haystack.len() - needle.len() {
        if haystack[i..i + needle.len()] == *needle {
            found.push((i, i + needle.len()));
        }
    }
    found
}

/// Searches every word of every segment for `query`, case-insensitively.
///
/// An empty or whitespace-only query yields zero matches by contract.
pub fn search_transcript(segments: &[Segment], query: &str) -> Vec<SearchMatch> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = fold_chars(query);

    let mut matches = Vec::new();
    for (segment_index, segment) in segments.iter().enumerate() {
        if segment.words.is_empty() {
            // No word-level data: fall back to the segment's raw text.
            for (start, end) in occurrences(&fold_chars(&segment.text), &needle) {
                matches.push(SearchMatch {
                    segment_id: segment.id.clone(),
                    segment_index,
                    word_index: None,
                    text: segment.text.clone(),
                    start,
                    end,
                });
            }
            continue;
        }

        for (word_index, word) in segment.words.iter().enumerate() {
            for (start, end) in occurrences(&fold_chars(&word.word), &needle) {
                matches.push(SearchMatch {
                    segment_id: segment.id.clone(),
                    segment_index,
                    word_index: Some(word_index),
                    text: word.word.clone(),
                    start,
                    end,
                });
            }
        }
    }
    matches
}

/// Index of the match after `current`, wrapping modulo `total`.
/// `None` when there are no matches.
pub fn next_match(current: usize, total: usize) -> Option<usize> {
    if total == 0 {
        None
    } else {
        Some((current + 1) % total)
    }
}

/// Index of the match before `current`, wrapping modulo `total`.
/// `None` when there are no matches.
pub fn previous_match(current: usize, total: usize) -> Option<usize> {
    if total == 0 {
        None
    } else {
        Some((current + total - 1) % total)
    }
}
