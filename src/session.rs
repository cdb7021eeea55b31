//! Session orchestration and the per-query error boundary.
//!
//! A [`Session`] owns the loaded document, the retrieval backend, and the
//! API client for a sequence of queries. Setup failures (missing document,
//! retriever initialization) are fatal; everything that goes wrong during a
//! query is absorbed by [`Session::process_query`] and converted into a
//! user-facing answer string, so no error escapes to the caller.

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::path::Path;

use crate::client::{ApiClient, QueryError};
use crate::config::Config;
use crate::document::{self, Document};
use crate::retrieve::{self, Retriever};
use crate::trace::{QueryEvent, QueryObserver};

/// Fixed user-facing messages for recoverable per-query failures.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Check your API token.";
pub const EMPTY_ANSWER_MESSAGE: &str = "The model returned an empty response.";
pub const NO_CONTEXT_MESSAGE: &str = "Retrieval failed. No context available.";

/// Result of one query: the answer plus the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub context: String,
}

/// One interactive session over a single document.
pub struct Session {
    document: Document,
    retriever: Box<dyn Retriever>,
    client: ApiClient,
    observer: Box<dyn QueryObserver>,
}

impl Session {
    /// Load the document and prepare the retrieval backend.
    ///
    /// # Errors
    ///
    /// Fails when the document does not exist or cannot be extracted, when
    /// the backend name is unknown, or when the backend cannot initialize
    /// (e.g. the embedding provider is unreachable).
    pub fn new(
        config: &Config,
        doc_path: &Path,
        token: Option<String>,
        observer: Box<dyn QueryObserver>,
    ) -> Result<Self> {
        let document = document::load_document(doc_path)?;
        observer.report(QueryEvent::DocumentLoaded {
            chars: document.text.chars().count(),
            fingerprint: document.fingerprint.clone(),
        });

        let mut retriever = retrieve::create_retriever(&config.retrieval, &config.embedding)?;
        retriever
            .initialize(&document, observer.as_ref())
            .context("failed to initialize the retriever")?;

        let client = ApiClient::new(config.api.clone(), token)?;

        Ok(Self {
            document,
            retriever,
            client,
            observer,
        })
    }

    /// The loaded document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Retrieve the context for a query without calling the endpoint.
    ///
    /// A backend failure falls back to the full document text.
    pub fn context_for(&mut self, query: &str) -> String {
        match self.retriever.retrieve(query, self.observer.as_ref()) {
            Ok(context) => context,
            Err(e) => {
                self.observer.report(QueryEvent::RetrievalFailed {
                    reason: e.to_string(),
                });
                self.document.text.clone()
            }
        }
    }

    /// Process one query end to end. Never returns an error: per-query
    /// failures become fixed or error-prefixed answers, and the outcome
    /// always carries whatever context was gathered.
    pub fn process_query(&mut self, query: &str) -> QueryOutcome {
        let context = self.context_for(query);
        if context.is_empty() {
            return QueryOutcome {
                answer: NO_CONTEXT_MESSAGE.to_string(),
                context,
            };
        }

        match self.client.query(query, &context, self.observer.as_ref()) {
            Ok(answer) => {
                self.observer.report(QueryEvent::AnswerComplete {
                    chars: answer.chars().count(),
                });
                QueryOutcome { answer, context }
            }
            Err(QueryError::Unauthorized) => QueryOutcome {
                answer: UNAUTHORIZED_MESSAGE.to_string(),
                context,
            },
            Err(QueryError::EmptyAnswer) => QueryOutcome {
                answer: EMPTY_ANSWER_MESSAGE.to_string(),
                context,
            },
            Err(QueryError::RequestFailed(reason)) => QueryOutcome {
                answer: format!("Request failed: {}", reason),
                context,
            },
        }
    }
}
