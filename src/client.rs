//! Chat completion client.
//!
//! Sends the assembled context plus the question to an OpenAI-compatible
//! chat completion endpoint and decodes the reply — streamed when the server
//! streams, buffered otherwise. Transient endpoint failures are retried with
//! exponential backoff; a 401 short-circuits before any body processing.

use std::io::BufReader;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::ApiConfig;
use crate::stream;
use crate::trace::{QueryEvent, QueryObserver};

const SYSTEM_PROMPT: &str = "\
You are an assistant that answers questions using only the provided context.

1. Read all of the provided context before answering.
2. Only use information present in the context.
3. Give a clear, direct answer built from the most relevant details.
4. If the answer is not in the context, reply with 'NO MATCH FOUND'.
5. Do not mention the retrieval process or the structure of the context \
in your answer.";

/// A per-query failure. Every variant is recoverable: the session converts
/// it into a fixed or error-prefixed answer string and continues.
#[derive(Debug)]
pub enum QueryError {
    /// The endpoint rejected the token (HTTP 401).
    Unauthorized,
    /// The request could not be completed (network, endpoint, or stream).
    RequestFailed(String),
    /// The endpoint replied, but with no answer text.
    EmptyAnswer,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Unauthorized => write!(f, "unauthorized (401)"),
            QueryError::RequestFailed(reason) => write!(f, "{}", reason),
            QueryError::EmptyAnswer => write!(f, "empty answer"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Blocking client for the configured completion endpoint.
pub struct ApiClient {
    config: ApiConfig,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// Ask the endpoint one question grounded on `context`.
    ///
    /// Returns the decoded answer text, or a [`QueryError`] that the session
    /// boundary converts into a user-facing message.
    pub fn query(
        &self,
        question: &str,
        context: &str,
        observer: &dyn QueryObserver,
    ) -> Result<String, QueryError> {
        let payload = build_payload(&self.config, question, context);
        let response = self.dispatch(&payload, observer)?;
        let answer = read_answer(response, observer)?;
        if answer.is_empty() {
            return Err(QueryError::EmptyAnswer);
        }
        Ok(answer)
    }

    /// Send the request, retrying transient failures with backoff.
    ///
    /// - HTTP 401 → [`QueryError::Unauthorized`], no retry
    /// - HTTP 429 or 5xx → retry with exponential backoff
    /// - other non-success → [`QueryError::RequestFailed`], no retry
    /// - connection errors → retry
    fn dispatch(
        &self,
        payload: &Value,
        observer: &dyn QueryObserver,
    ) -> Result<reqwest::blocking::Response, QueryError> {
        observer.report(QueryEvent::RequestStarted {
            url: self.config.url.clone(),
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                observer.report(QueryEvent::RequestRetry {
                    attempt,
                    wait_secs: delay.as_secs(),
                });
                std::thread::sleep(delay);
            }

            let mut builder = self
                .client
                .post(&self.config.url)
                .header("Content-Type", "application/json")
                .json(payload);
            if let Some(ref token) = self.token {
                builder = builder.header("Authorization", format!("Bearer {}", token));
            }

            match builder.send() {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 401 {
                        return Err(QueryError::Unauthorized);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().unwrap_or_default();
                        last_err = Some(format!(
                            "endpoint error {}: {}",
                            status,
                            excerpt(&body)
                        ));
                        continue;
                    }

                    if !status.is_success() {
                        let body = response.text().unwrap_or_default();
                        return Err(QueryError::RequestFailed(format!(
                            "endpoint error {}: {}",
                            status,
                            excerpt(&body)
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(QueryError::RequestFailed(last_err.unwrap_or_else(|| {
            "request failed after retries".to_string()
        })))
    }
}

/// Decode the response body, choosing line-framed or buffered mode.
///
/// Line mode when the content-type announces an event stream or plain text;
/// otherwise the body is read whole, and still handed to the line decoder
/// when it turns out to begin with the SSE marker (some servers stream
/// without saying so).
fn read_answer(
    response: reqwest::blocking::Response,
    observer: &dyn QueryObserver,
) -> Result<String, QueryError> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if is_stream_content_type(&content_type) {
        return stream::decode_streaming(BufReader::new(response), observer)
            .map_err(|e| QueryError::RequestFailed(e.to_string()));
    }

    let body = response
        .text()
        .map_err(|e| QueryError::RequestFailed(format!("failed to read response body: {}", e)))?;

    if body.trim_start().starts_with("data:") {
        stream::decode_streaming(body.as_bytes(), observer)
            .map_err(|e| QueryError::RequestFailed(e.to_string()))
    } else {
        Ok(stream::decode_buffered(&body))
    }
}

fn is_stream_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/event-stream")
        || content_type.starts_with("text/plain")
        || content_type.contains("stream")
}

/// Build the completion request payload. `model` is included only when
/// configured, matching endpoints that reject or require the field.
fn build_payload(config: &ApiConfig, question: &str, context: &str) -> Value {
    let user_prompt = format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer strictly based on the context above:",
        context, question
    );

    let mut payload = json!({
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": user_prompt},
        ],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "stream": true,
    });

    if let Some(ref model) = config.model {
        payload["model"] = json!(model);
    }

    payload
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        trimmed.to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
