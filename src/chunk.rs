//! Fixed-size overlapping window chunker.
//!
//! Splits document text into windows of `chunk_size` characters, advancing
//! by `chunk_size - overlap` so consecutive windows share a configurable
//! amount of context. Windows that are whitespace-only after trimming are
//! dropped; recorded positions always refer to the untrimmed window bounds.

use crate::models::Chunk;

/// Split text into overlapping windows measured in characters.
///
/// Callers must ensure `chunk_size > 0` and `overlap < chunk_size`
/// (validated at config load). The sequence is deterministic: identical
/// input always yields identical chunk boundaries. A document shorter than
/// `chunk_size` yields exactly one chunk spanning the whole document; an
/// empty document yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let stride = chunk_size - overlap;

    // Byte offset of every character boundary, including the end of text,
    // so windows can be sliced without splitting a multi-byte character.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain([text.len()])
        .collect();
    let n_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < n_chars {
        let end = (start + chunk_size).min(n_chars);
        let window = &text[boundaries[start]..boundaries[end]];
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                start_char: start,
                end_char: end,
            });
        }
        start += stride;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = chunk_text("Hello, world!", 2000, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 13);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_document_no_chunks() {
        assert!(chunk_text("", 2000, 500).is_empty());
    }

    #[test]
    fn test_window_arithmetic() {
        // 10 chars, size 4, overlap 1 => stride 3: [0,4) [3,7) [6,10) [9,10)
        let chunks = chunk_text("0123456789", 4, 1);
        let bounds: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_char, c.end_char)).collect();
        assert_eq!(bounds, vec![(0, 4), (3, 7), (6, 10), (9, 10)]);
    }

    #[test]
    fn test_coverage_no_gaps() {
        let text: String = (0..50).map(|i| format!("word{} ", i)).collect();
        let n_chars = text.chars().count();
        let chunks = chunk_text(&text, 64, 16);

        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks.last().unwrap().end_char, n_chars);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].start_char <= pair[0].end_char,
                "gap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
            // All but the final window overlap by the configured amount.
            if pair[1].end_char - pair[1].start_char == 64 {
                assert_eq!(pair[0].end_char - pair[1].start_char, 16);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let a = chunk_text(&text, 100, 20);
        let b = chunk_text(&text, 100, 20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_window_dropped_positions_kept() {
        // "ab" + 6 spaces + "yz": the middle window is whitespace-only.
        let text = format!("ab{}yz", " ".repeat(6));
        let chunks = chunk_text(&text, 4, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].text, "ab");
        assert_eq!(chunks[1].start_char, 8);
        assert_eq!(chunks[1].text, "yz");
    }

    #[test]
    fn test_positions_are_character_based() {
        let text = "héllo wörld, ünïcode text here";
        let n_chars = text.chars().count();
        let chunks = chunk_text(text, 10, 2);
        assert_eq!(chunks.last().unwrap().end_char, n_chars);
        for c in &chunks {
            assert!(c.start_char < c.end_char);
            assert!(c.end_char <= n_chars);
        }
    }
}
