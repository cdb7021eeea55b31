//! Retrieval backends.
//!
//! A [`Retriever`] turns a question into a context string for the prompt.
//! Two backends share one interface, selected at session setup:
//! - **[`KeywordRetriever`]** — TF-IDF ranking over cached chunks.
//! - **[`HybridRetriever`]** — weighted merge of TF-IDF and embedding
//!   similarity over the same chunks.
//!
//! Both fall back to the full document when the retrieval signal is weak.

use anyhow::{bail, Result};

use crate::chunk::chunk_text;
use crate::config::{EmbeddingConfig, RetrievalConfig};
use crate::document::Document;
use crate::embedding;
use crate::merge::merge_chunks;
use crate::models::{Chunk, ScoredChunk};
use crate::rank;
use crate::trace::{QueryEvent, QueryObserver};

/// Retrieval capability consumed by the session.
///
/// `initialize` prepares per-document state (chunking, embedding) once per
/// session; `retrieve` produces the context for one query. Implementations
/// hold no cross-query mutable ranking state, so sequential queries can
/// reuse the chunk cache read-only.
pub trait Retriever {
    fn initialize(&mut self, document: &Document, observer: &dyn QueryObserver) -> Result<()>;
    fn retrieve(&mut self, query: &str, observer: &dyn QueryObserver) -> Result<String>;
}

/// Build the configured backend.
pub fn create_retriever(
    retrieval: &RetrievalConfig,
    embedding: &EmbeddingConfig,
) -> Result<Box<dyn Retriever>> {
    match retrieval.backend.as_str() {
        "keyword" => Ok(Box::new(KeywordRetriever::new(retrieval.clone()))),
        "hybrid" => Ok(Box::new(HybridRetriever::new(
            retrieval.clone(),
            embedding.clone(),
        ))),
        other => bail!(
            "Unknown retrieval backend: '{}'. Must be keyword or hybrid.",
            other
        ),
    }
}

/// Apply the full-document fallback and report the assembled context.
fn finish_context(
    merged: String,
    full_text: &str,
    min_context_chars: usize,
    observer: &dyn QueryObserver,
) -> String {
    let fallback = merged.chars().count() < min_context_chars;
    let context = if fallback {
        full_text.to_string()
    } else {
        merged
    };
    observer.report(QueryEvent::ContextAssembled {
        chars: context.chars().count(),
        fallback,
    });
    context
}

fn report_ranked(selected: &[ScoredChunk], observer: &dyn QueryObserver) {
    observer.report(QueryEvent::ChunksRanked {
        selected: selected.len(),
        top_score: selected.first().map(|s| s.score).unwrap_or(0.0),
    });
}

// ============ Keyword backend ============

/// TF-IDF retrieval over cached document chunks.
pub struct KeywordRetriever {
    config: RetrievalConfig,
    full_text: String,
    chunks: Vec<Chunk>,
}

impl KeywordRetriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self {
            config,
            full_text: String::new(),
            chunks: Vec::new(),
        }
    }
}

impl Retriever for KeywordRetriever {
    fn initialize(&mut self, document: &Document, observer: &dyn QueryObserver) -> Result<()> {
        self.full_text = document.text.clone();
        self.chunks = chunk_text(&document.text, self.config.chunk_size, self.config.overlap);
        observer.report(QueryEvent::ChunksBuilt {
            count: self.chunks.len(),
        });
        Ok(())
    }

    fn retrieve(&mut self, query: &str, observer: &dyn QueryObserver) -> Result<String> {
        let selected = rank::rank(
            &self.chunks,
            query,
            self.config.top_k,
            self.config.min_score,
        );
        report_ranked(&selected, observer);
        let merged = merge_chunks(&selected, self.config.proximity_chars);
        Ok(finish_context(
            merged,
            &self.full_text,
            self.config.min_context_chars,
            observer,
        ))
    }
}

// ============ Hybrid backend ============

/// Retrieval over the same chunks, scoring each as a weighted merge of
/// TF-IDF and embedding cosine similarity.
///
/// Both score sets are min-max normalized to `[0, 1]` before merging with
/// `hybrid_alpha`: alpha 0 reproduces pure keyword ordering, alpha 1 pure
/// vector ordering.
pub struct HybridRetriever {
    config: RetrievalConfig,
    embedding: EmbeddingConfig,
    full_text: String,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl HybridRetriever {
    pub fn new(config: RetrievalConfig, embedding: EmbeddingConfig) -> Self {
        Self {
            config,
            embedding,
            full_text: String::new(),
            chunks: Vec::new(),
            vectors: Vec::new(),
        }
    }
}

impl Retriever for HybridRetriever {
    fn initialize(&mut self, document: &Document, observer: &dyn QueryObserver) -> Result<()> {
        let provider = embedding::create_provider(&self.embedding)?;

        self.full_text = document.text.clone();
        self.chunks = chunk_text(&document.text, self.config.chunk_size, self.config.overlap);
        observer.report(QueryEvent::ChunksBuilt {
            count: self.chunks.len(),
        });

        let texts: Vec<String> = self.chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedding.batch_size.max(1)) {
            vectors.extend(embedding::embed_texts(&self.embedding, batch)?);
        }
        if vectors.len() != self.chunks.len() {
            bail!(
                "embedding count mismatch: {} vectors for {} chunks",
                vectors.len(),
                self.chunks.len()
            );
        }
        observer.report(QueryEvent::ChunksEmbedded {
            count: vectors.len(),
            model: provider.model_name().to_string(),
        });
        self.vectors = vectors;
        Ok(())
    }

    fn retrieve(&mut self, query: &str, observer: &dyn QueryObserver) -> Result<String> {
        if self.chunks.is_empty() {
            return Ok(finish_context(
                String::new(),
                &self.full_text,
                self.config.min_context_chars,
                observer,
            ));
        }

        let keyword_scores = rank::score_chunks(&self.chunks, query);
        let query_vec = embedding::embed_query(&self.embedding, query)?;
        let vector_scores: Vec<f64> = self
            .vectors
            .iter()
            .map(|v| embedding::cosine_similarity(&query_vec, v) as f64)
            .collect();

        let norm_keyword = normalize_scores(&keyword_scores);
        let norm_vector = normalize_scores(&vector_scores);
        let alpha = self.config.hybrid_alpha;

        let scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score: (1.0 - alpha) * norm_keyword[i] + alpha * norm_vector[i],
            })
            .collect();

        let selected = rank::select_top(scored, self.config.top_k, self.config.min_score);
        report_ranked(&selected, observer);
        let merged = merge_chunks(&selected, self.config.proximity_chars);
        Ok(finish_context(
            merged,
            &self.full_text,
            self.config.min_context_chars,
            observer,
        ))
    }
}

/// Min-max normalize scores to [0, 1].
///
/// All-equal nonzero scores normalize to 1.0; an all-zero set stays zero so
/// a signal-free channel cannot dominate the merge.
fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if (s_max - s_min).abs() < f64::EPSILON {
        let level = if s_max.abs() < f64::EPSILON { 0.0 } else { 1.0 };
        return vec![level; scores.len()];
    }

    scores
        .iter()
        .map(|s| (s - s_min) / (s_max - s_min))
        .collect()
}
