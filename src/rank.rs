//! TF-IDF ranking of chunks against a query.
//!
//! Builds a sparse term-frequency / inverse-document-frequency model over
//! the chunk set plus the query (unigrams and bigrams, English stop-words
//! removed) and scores each chunk by cosine similarity to the query vector.
//! The model is rebuilt per query, so no ranking state survives a call.

use std::collections::{HashMap, HashSet};

use crate::models::{Chunk, ScoredChunk};

/// Common English words excluded from the term model.
const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being",
    "below", "between", "both", "but", "by", "can", "cannot", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "if", "in", "into", "is", "it",
    "its", "itself", "just", "me", "more", "most", "my", "myself", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercased alphanumeric tokens of length >= 2, stop-words removed.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() >= 2)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Unigrams plus bigrams over the post-stop-word token sequence.
fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = tokens.clone();
    terms.extend(tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// Smoothed-idf weighted, L2-normalized sparse vector for one document.
fn weigh<'a>(
    doc_terms: &'a [String],
    df: &HashMap<&str, usize>,
    n_docs: usize,
) -> HashMap<&'a str, f64> {
    let mut vec: HashMap<&str, f64> = HashMap::new();
    for term in doc_terms {
        *vec.entry(term.as_str()).or_insert(0.0) += 1.0;
    }
    for (term, weight) in vec.iter_mut() {
        let d = df.get(term).copied().unwrap_or(0) as f64;
        let idf = ((1.0 + n_docs as f64) / (1.0 + d)).ln() + 1.0;
        *weight *= idf;
    }
    let norm = vec.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in vec.values_mut() {
            *weight /= norm;
        }
    }
    vec
}

fn dot(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

/// Cosine similarity of every chunk against the query, in chunk order.
///
/// Document frequency is computed over the chunk set plus the query itself.
/// Scores are in `[0, 1]`; a query sharing no vocabulary with a chunk
/// scores 0 for it.
pub fn score_chunks(chunks: &[Chunk], query: &str) -> Vec<f64> {
    let chunk_terms: Vec<Vec<String>> = chunks.iter().map(|c| terms(&c.text)).collect();
    let query_terms = terms(query);

    let n_docs = chunk_terms.len() + 1;
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in chunk_terms.iter().chain(std::iter::once(&query_terms)) {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    let query_vec = weigh(&query_terms, &df, n_docs);
    chunk_terms
        .iter()
        .map(|doc| dot(&query_vec, &weigh(doc, &df, n_docs)))
        .collect()
}

/// Rank chunks against a query: descending score, at most `top_k` results,
/// everything at or below `min_score` dropped.
///
/// Never fails: an empty chunk set or a query with no shared vocabulary
/// yields an empty result, and the caller is expected to fall back to the
/// full document.
pub fn rank(chunks: &[Chunk], query: &str, top_k: usize, min_score: f64) -> Vec<ScoredChunk> {
    if chunks.is_empty() {
        return Vec::new();
    }
    let scored = chunks
        .iter()
        .zip(score_chunks(chunks, query))
        .map(|(chunk, score)| ScoredChunk {
            chunk: chunk.clone(),
            score,
        })
        .collect();
    select_top(scored, top_k, min_score)
}

/// Shared selection step for the keyword and hybrid backends: stable sort by
/// score descending (ties keep original chunk order), truncate to `top_k`,
/// filter out low-confidence entries.
pub fn select_top(mut scored: Vec<ScoredChunk>, top_k: usize, min_score: f64) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored.retain(|s| s.score > min_score);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(text: &str, start: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            start_char: start,
            end_char: start + text.chars().count(),
        }
    }

    #[test]
    fn test_empty_chunks_empty_result() {
        assert!(rank(&[], "anything at all", 10, 0.1).is_empty());
    }

    #[test]
    fn test_no_shared_vocabulary_empty_result() {
        let chunks = vec![
            make_chunk("alpha beta gamma delta", 0),
            make_chunk("epsilon zeta eta theta", 100),
        ];
        let result = rank(&chunks, "zebra quagga okapi", 10, 0.1);
        assert!(result.is_empty());
    }

    #[test]
    fn test_scores_descending_and_above_threshold() {
        let chunks = vec![
            make_chunk("the weather today is sunny and warm", 0),
            make_chunk("database replication uses a quorum protocol", 100),
            make_chunk("replication lag grows when the quorum protocol stalls", 200),
        ];
        let result = rank(&chunks, "quorum replication protocol", 10, 0.1);
        assert!(!result.is_empty());
        for pair in result.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for s in &result {
            assert!(s.score > 0.1, "score {} not above threshold", s.score);
            assert!(s.score <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_top_k_limit() {
        let chunks: Vec<Chunk> = (0..8)
            .map(|i| make_chunk("service restart procedure for the gateway", i * 100))
            .collect();
        let result = rank(&chunks, "gateway restart procedure", 3, 0.0);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_ties_keep_original_chunk_order() {
        let chunks = vec![
            make_chunk("token expiry causes login failures", 0),
            make_chunk("unrelated notes on cafeteria menus", 100),
            make_chunk("token expiry causes login failures", 200),
        ];
        let result = rank(&chunks, "token expiry login", 10, 0.0);
        assert!(result.len() >= 2);
        assert_eq!(result[0].chunk.start_char, 0);
        assert_eq!(result[1].chunk.start_char, 200);
    }

    #[test]
    fn test_bigram_phrase_outranks_scattered_words() {
        let chunks = vec![
            make_chunk("handling of the disk after an error was reported", 0),
            make_chunk("error handling is described in this section", 100),
        ];
        let result = rank(&chunks, "error handling", 10, 0.0);
        assert!(!result.is_empty());
        assert_eq!(
            result[0].chunk.start_char, 100,
            "the chunk containing the phrase should rank first"
        );
    }

    #[test]
    fn test_stop_words_carry_no_signal() {
        let chunks = vec![make_chunk("the and of with from into", 0)];
        let result = rank(&chunks, "the and of", 10, 0.0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_score_chunks_aligned_with_input() {
        let chunks = vec![
            make_chunk("rust ownership and borrowing", 0),
            make_chunk("python garbage collection", 100),
        ];
        let scores = score_chunks(&chunks, "rust borrowing");
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
        assert!(scores[1].abs() < 1e-9);
    }
}
