//! Per-query progress reporting.
//!
//! Reports observable progress while a query runs (document load, chunking,
//! ranking, request dispatch, stream anomalies) so users can see what the
//! session is doing. Events are emitted on **stderr** so stdout remains
//! parseable for scripts. The reporter is passed explicitly through the
//! pipeline instead of living in process-global state, which keeps the core
//! components testable in isolation.

use std::io::Write;

/// A single observable event during session setup or query processing.
#[derive(Clone, Debug)]
pub enum QueryEvent {
    /// The document was read and fingerprinted.
    DocumentLoaded { chars: usize, fingerprint: String },
    /// The chunk cache for the document was built.
    ChunksBuilt { count: usize },
    /// All chunks were embedded (hybrid backend only).
    ChunksEmbedded { count: usize, model: String },
    /// Ranking selected `selected` chunks; `top_score` is the best score.
    ChunksRanked { selected: usize, top_score: f64 },
    /// The context string is ready; `fallback` means the full document was used.
    ContextAssembled { chars: usize, fallback: bool },
    /// The retrieval backend failed; the full document will be used instead.
    RetrievalFailed { reason: String },
    /// The completion request is being dispatched.
    RequestStarted { url: String },
    /// A transient endpoint failure triggered a retry.
    RequestRetry { attempt: u32, wait_secs: u64 },
    /// A stream frame carried no extractable text and was skipped.
    FrameSkipped { preview: String },
    /// The response stream broke mid-answer; the partial answer is kept.
    StreamInterrupted { reason: String },
    /// The final answer was assembled.
    AnswerComplete { chars: usize },
}

/// Reports query progress. Implementations write to stderr (human or JSON).
pub trait QueryObserver: Send + Sync {
    /// Emit a progress event. Called from the retrieval and client layers.
    fn report(&self, event: QueryEvent);
}

/// Human-friendly progress on stderr: "retrieve  ranked 4 chunks  top 0.31".
pub struct StderrTrace;

impl QueryObserver for StderrTrace {
    fn report(&self, event: QueryEvent) {
        let line = match &event {
            QueryEvent::DocumentLoaded { chars, fingerprint } => {
                format!(
                    "document  loaded  {} chars  {}\n",
                    format_number(*chars as u64),
                    &fingerprint[..fingerprint.len().min(12)]
                )
            }
            QueryEvent::ChunksBuilt { count } => {
                format!("document  chunked  {} chunks\n", format_number(*count as u64))
            }
            QueryEvent::ChunksEmbedded { count, model } => {
                format!(
                    "document  embedded  {} chunks  {}\n",
                    format_number(*count as u64),
                    model
                )
            }
            QueryEvent::ChunksRanked {
                selected,
                top_score,
            } => {
                format!("retrieve  ranked  {} chunks  top {:.2}\n", selected, top_score)
            }
            QueryEvent::ContextAssembled { chars, fallback } => {
                if *fallback {
                    format!(
                        "retrieve  weak signal, using full document  {} chars\n",
                        format_number(*chars as u64)
                    )
                } else {
                    format!(
                        "retrieve  context ready  {} chars\n",
                        format_number(*chars as u64)
                    )
                }
            }
            QueryEvent::RetrievalFailed { reason } => {
                format!("retrieve  failed ({}), using full document\n", reason)
            }
            QueryEvent::RequestStarted { url } => format!("request   POST {}\n", url),
            QueryEvent::RequestRetry { attempt, wait_secs } => {
                format!("request   retry {} in {}s\n", attempt, wait_secs)
            }
            QueryEvent::FrameSkipped { preview } => {
                format!("stream    skipped frame: {}\n", preview)
            }
            QueryEvent::StreamInterrupted { reason } => {
                format!("stream    interrupted ({}), keeping partial answer\n", reason)
            }
            QueryEvent::AnswerComplete { chars } => {
                format!("answer    {} chars\n", format_number(*chars as u64))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonTrace;

impl QueryObserver for JsonTrace {
    fn report(&self, event: QueryEvent) {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let obj = match &event {
            QueryEvent::DocumentLoaded { chars, fingerprint } => serde_json::json!({
                "event": "document_loaded", "chars": chars, "fingerprint": fingerprint, "ts": ts
            }),
            QueryEvent::ChunksBuilt { count } => serde_json::json!({
                "event": "chunks_built", "count": count, "ts": ts
            }),
            QueryEvent::ChunksEmbedded { count, model } => serde_json::json!({
                "event": "chunks_embedded", "count": count, "model": model, "ts": ts
            }),
            QueryEvent::ChunksRanked { selected, top_score } => serde_json::json!({
                "event": "chunks_ranked", "selected": selected, "top_score": top_score, "ts": ts
            }),
            QueryEvent::ContextAssembled { chars, fallback } => serde_json::json!({
                "event": "context_assembled", "chars": chars, "fallback": fallback, "ts": ts
            }),
            QueryEvent::RetrievalFailed { reason } => serde_json::json!({
                "event": "retrieval_failed", "reason": reason, "ts": ts
            }),
            QueryEvent::RequestStarted { url } => serde_json::json!({
                "event": "request_started", "url": url, "ts": ts
            }),
            QueryEvent::RequestRetry { attempt, wait_secs } => serde_json::json!({
                "event": "request_retry", "attempt": attempt, "wait_secs": wait_secs, "ts": ts
            }),
            QueryEvent::FrameSkipped { preview } => serde_json::json!({
                "event": "frame_skipped", "preview": preview, "ts": ts
            }),
            QueryEvent::StreamInterrupted { reason } => serde_json::json!({
                "event": "stream_interrupted", "reason": reason, "ts": ts
            }),
            QueryEvent::AnswerComplete { chars } => serde_json::json!({
                "event": "answer_complete", "chars": chars, "ts": ts
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when tracing is disabled.
pub struct NoTrace;

impl QueryObserver for NoTrace {
    fn report(&self, _event: QueryEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Trace mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceMode {
    Off,
    Human,
    Json,
}

impl TraceMode {
    /// Default: human trace when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            TraceMode::Human
        } else {
            TraceMode::Off
        }
    }

    /// Parse a `--trace` flag value.
    pub fn from_flag(value: &str) -> anyhow::Result<Self> {
        match value {
            "off" => Ok(TraceMode::Off),
            "human" => Ok(TraceMode::Human),
            "json" => Ok(TraceMode::Json),
            other => anyhow::bail!("Unknown trace mode: {}. Use off, human, or json.", other),
        }
    }

    /// Build a reporter for this mode. Caller passes it through the session.
    pub fn reporter(&self) -> Box<dyn QueryObserver> {
        match self {
            TraceMode::Off => Box::new(NoTrace),
            TraceMode::Human => Box::new(StderrTrace),
            TraceMode::Json => Box::new(JsonTrace),
        }
    }
}
