//! Response stream decoding.
//!
//! Turns a chat completion response body into a single answer string.
//! Servers disagree about framing — server-sent-event lines, bare JSON
//! lines, or one buffered JSON object — and about payload shape, so the
//! decoder is deliberately tolerant: a malformed frame is skipped or taken
//! as literal text, and never aborts the stream.

use std::io::BufRead;

use serde_json::Value;

use crate::trace::{QueryEvent, QueryObserver};

/// SSE event marker stripped from the front of a frame line.
const DATA_PREFIX: &str = "data:";

/// End-of-stream sentinel payload; decoding stops immediately when seen.
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A piece of answer text.
    Delta(String),
    /// End of stream.
    Done,
}

/// The stream broke before any answer text was accumulated.
#[derive(Debug)]
pub struct StreamInterrupted(pub String);

impl std::fmt::Display for StreamInterrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "response stream interrupted: {}", self.0)
    }
}

impl std::error::Error for StreamInterrupted {}

// Payload shapes tried in priority order; the first present shape wins.
const SHAPE_MATCHERS: &[fn(&Value) -> Option<String>] =
    &[delta_content, message_content, choice_text];

/// `{"choices":[{"delta":{"content": ...}}]}` — incremental streaming shape.
fn delta_content(payload: &Value) -> Option<String> {
    payload
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `{"choices":[{"message":{"content": ...}}]}` — full message shape.
fn message_content(payload: &Value) -> Option<String> {
    payload
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `{"choices":[{"text": ...}]}` — plain text shape used by some servers.
fn choice_text(payload: &Value) -> Option<String> {
    payload
        .get("choices")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Decode one frame payload (the line content after any `data:` strip).
///
/// Returns `None` when the payload carries no extractable text: a valid
/// object with none of the known shapes, or an undecodable payload that
/// looks structured (starts with `{`). An undecodable payload that does not
/// look structured is taken as literal text, a fallback for servers that
/// stream bare text lines.
pub fn decode_frame(payload: &str) -> Option<StreamFrame> {
    if payload == DONE_SENTINEL {
        return Some(StreamFrame::Done);
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => SHAPE_MATCHERS
            .iter()
            .find_map(|matcher| matcher(&value))
            .map(StreamFrame::Delta),
        Err(_) if !payload.starts_with('{') => Some(StreamFrame::Delta(payload.to_string())),
        Err(_) => None,
    }
}

/// Decode a line-framed response body (SSE or bare JSON lines).
///
/// Blank lines are skipped; every other line is one frame payload, with a
/// leading `data:` marker stripped when present. Consumption stops at the
/// `[DONE]` sentinel. A read error mid-stream yields whatever answer was
/// accumulated so far, or [`StreamInterrupted`] when nothing was.
pub fn decode_streaming<R: BufRead>(
    body: R,
    observer: &dyn QueryObserver,
) -> Result<String, StreamInterrupted> {
    let mut answer = String::new();

    for line in body.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                if answer.trim().is_empty() {
                    return Err(StreamInterrupted(e.to_string()));
                }
                observer.report(QueryEvent::StreamInterrupted {
                    reason: e.to_string(),
                });
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let payload = line
            .strip_prefix(DATA_PREFIX)
            .map(str::trim_start)
            .unwrap_or(line);

        match decode_frame(payload) {
            Some(StreamFrame::Delta(delta)) => answer.push_str(&delta),
            Some(StreamFrame::Done) => break,
            None => observer.report(QueryEvent::FrameSkipped {
                preview: payload.chars().take(48).collect(),
            }),
        }
    }

    Ok(answer.trim().to_string())
}

/// Decode a buffered (non-streaming) response body.
///
/// Tries the full-message shape first; a decodable object without it falls
/// back to a JSON rendering of the whole object, and an undecodable body
/// falls back to the raw text. The result is trimmed.
pub fn decode_buffered(body: &str) -> String {
    let extracted = match serde_json::from_str::<Value>(body) {
        Ok(value) => message_content(&value).unwrap_or_else(|| value.to_string()),
        Err(_) => body.to_string(),
    };
    extracted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NoTrace;
    use std::io::{self, Read};

    fn decode(lines: &str) -> String {
        decode_streaming(lines.as_bytes(), &NoTrace).unwrap()
    }

    #[test]
    fn test_delta_frames_concatenate() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        );
        assert_eq!(decode(body), "Hello");
    }

    #[test]
    fn test_done_stops_consumption() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"yes\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"no\"}}]}\n",
        );
        assert_eq!(decode(body), "yes");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let body = concat!(
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        );
        assert_eq!(decode(body), "ab");
    }

    #[test]
    fn test_non_json_payload_is_literal_text() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"one \"}}]}\n",
            "data: not-json\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" two\"}}]}\n",
        );
        assert_eq!(decode(body), "one not-json two");
    }

    #[test]
    fn test_malformed_object_payload_skipped() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"kept\"}}]}\n",
            "data: {\"choices\": [{\"delta\": truncated\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" too\"}}]}\n",
        );
        assert_eq!(decode(body), "kept too");
    }

    #[test]
    fn test_message_and_text_shapes() {
        let body = concat!(
            "data: {\"choices\":[{\"message\":{\"content\":\"full \"}}]}\n",
            "data: {\"choices\":[{\"text\":\"plain\"}]}\n",
        );
        assert_eq!(decode(body), "full plain");
    }

    #[test]
    fn test_shape_priority_delta_wins() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"d\"},\"message\":{\"content\":\"m\"}}]}\n";
        assert_eq!(decode(body), "d");
    }

    #[test]
    fn test_object_without_known_shape_yields_nothing() {
        let body = concat!(
            "data: {\"ping\": true}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
        );
        assert_eq!(decode(body), "x");
    }

    #[test]
    fn test_unprefixed_json_lines_decode() {
        let body = concat!(
            "{\"choices\":[{\"delta\":{\"content\":\"no \"}}]}\n",
            "{\"choices\":[{\"delta\":{\"content\":\"prefix\"}}]}\n",
        );
        assert_eq!(decode(body), "no prefix");
    }

    #[test]
    fn test_buffered_message_content() {
        let body = "{\"choices\":[{\"message\":{\"content\":\"Paris\"}}]}";
        assert_eq!(decode_buffered(body), "Paris");
    }

    #[test]
    fn test_buffered_falls_back_to_json_rendering() {
        let body = "{\"status\":\"no choices here\"}";
        let out = decode_buffered(body);
        assert!(out.contains("no choices here"));
    }

    #[test]
    fn test_buffered_falls_back_to_raw_text() {
        assert_eq!(decode_buffered("  just plain text  "), "just plain text");
    }

    /// Reader that yields its data, then fails.
    struct FailingReader<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl Read for FailingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos < self.data.len() {
                let n = buf.len().min(self.data.len() - self.pos);
                buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                self.pos += n;
                Ok(n)
            } else {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
    }

    #[test]
    fn test_interrupted_stream_keeps_partial_answer() {
        let data = b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n";
        let reader = io::BufReader::new(FailingReader { data, pos: 0 });
        let answer = decode_streaming(reader, &NoTrace).unwrap();
        assert_eq!(answer, "partial");
    }

    #[test]
    fn test_interrupted_stream_with_nothing_is_an_error() {
        let reader = io::BufReader::new(FailingReader { data: b"", pos: 0 });
        assert!(decode_streaming(reader, &NoTrace).is_err());
    }
}
