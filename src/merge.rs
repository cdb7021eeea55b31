//! Proximity-based chunk merging.
//!
//! Selected chunks are stitched back into a single context string in
//! document order. Chunks that sit close together in the source are joined
//! into one paragraph; distant chunks are separated by a blank line, so the
//! downstream consumer sees coherent passages instead of fragments.

use crate::models::{Chunk, ScoredChunk};

/// Merge selected chunks into a context string.
///
/// Chunks are sorted by `start_char` (score order is irrelevant here). A
/// chunk whose start is within `proximity_chars` of the previous chunk's end
/// continues the current paragraph with a single space; otherwise a new
/// blank-line-separated paragraph begins. Overlapping chunks always merge.
/// The result is trimmed; empty input yields an empty string.
pub fn merge_chunks(selected: &[ScoredChunk], proximity_chars: usize) -> String {
    let mut ordered: Vec<&Chunk> = selected.iter().map(|s| &s.chunk).collect();
    ordered.sort_by_key(|c| c.start_char);

    let mut merged = String::new();
    let mut last_end: Option<usize> = None;

    for chunk in ordered {
        match last_end {
            Some(end) if chunk.start_char.saturating_sub(end) < proximity_chars => {
                merged.push(' ');
            }
            Some(_) => merged.push_str("\n\n"),
            None => {}
        }
        merged.push_str(&chunk.text);
        last_end = Some(chunk.end_char);
    }

    merged.trim().to_string()
}
