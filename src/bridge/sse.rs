//! Server-Sent Events line handling.
//!
//! Upstream streams are plain text lines; lines starting with `data: ` carry
//! a JSON payload and everything else (comments, `event:` fields, blank
//! separators) is ignored.

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use crate::error::GatewayError;

/// Prefix of lines that carry an event payload.
pub const DATA_PREFIX: &str = "data: ";

/// Returns the payload of a `data: ` line, or `None` for any other line.
#[must_use]
pub fn extract_data(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX)
}

/// Parses one line.
///
/// Returns `Ok(None)` for lines that carry no payload.
///
/// # Errors
///
/// Returns the JSON error when a `data: ` line does not hold valid JSON.
pub fn parse_data_line(line: &str) -> Result<Option<serde_json::Value>, serde_json::Error> {
    extract_data(line).map(serde_json::from_str).transpose()
}

/// Longest line kept in memory. Longer lines are dropped.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Line splitter state carried between `unfold` steps.
struct LineReader {
    stream: BoxStream<'static, Result<Bytes, GatewayError>>,
    buffer: BytesMut,
    /// Skipping the rest of an oversized line up to its terminator.
    discarding: bool,
    done: bool,
}

impl LineReader {
    /// Takes the next complete line out of the buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos.saturating_sub(1));
            }
            match std::str::from_utf8(&line) {
                Ok(text) => return Some(text.to_string()),
                Err(_) => tracing::debug!("skipping non-UTF-8 upstream line"),
            }
        }
        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                limit = MAX_LINE_BYTES,
                "dropping oversized upstream line"
            );
            self.buffer.clear();
            self.discarding = true;
        }
        None
    }
}

/// Splits a byte stream into text lines.
///
/// Handles `\n` and `\r\n` terminators and chunk boundaries that fall inside
/// a line. Lines that are not valid UTF-8 or longer than [`MAX_LINE_BYTES`]
/// are skipped. A read error is yielded once and ends the stream; a trailing
/// unterminated line is yielded when the byte stream ends.
pub fn lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, GatewayError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<GatewayError> + Send + 'static,
{
    let reader = LineReader {
        stream: byte_stream.map(|chunk| chunk.map_err(Into::into)).boxed(),
        buffer: BytesMut::with_capacity(8192),
        discarding: false,
        done: false,
    };
    futures_util::stream::unfold(reader, |mut reader| async move {
        if reader.done {
            return None;
        }
        loop {
            if let Some(line) = reader.take_line() {
                return Some((Ok(line), reader));
            }

            match reader.stream.next().await {
                Some(Ok(chunk)) => reader.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    reader.done = true;
                    return Some((Err(e), reader));
                }
                None => {
                    reader.done = true;
                    if reader.buffer.is_empty() || reader.discarding {
                        return None;
                    }
                    let rest = reader.buffer.split();
                    return match std::str::from_utf8(&rest) {
                        Ok(text) => Some((Ok(text.to_string()), reader)),
                        Err(_) => None,
                    };
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(
        parts: &[&'static str],
    ) -> impl Stream<Item = Result<Bytes, GatewayError>> + Send + 'static {
        let items: Vec<Result<Bytes, GatewayError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        futures_util::stream::iter(items)
    }

    async fn collect_lines(parts: &[&'static str]) -> Vec<String> {
        lines(chunks(parts))
            .map(|line| match line {
                Ok(line) => line,
                Err(e) => panic!("unexpected error: {e}"),
            })
            .collect()
            .await
    }

    #[test]
    fn only_data_lines_carry_payloads() {
        assert_eq!(extract_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(extract_data("event: alert"), None);
        assert_eq!(extract_data(": keep-alive"), None);
        assert_eq!(extract_data("data:{}"), None);
    }

    #[test]
    fn parse_data_line_outcomes() {
        let Ok(Some(value)) = parse_data_line(r#"data: {"id":"x1"}"#) else {
            panic!("valid data line");
        };
        assert_eq!(value, json!({"id": "x1"}));
        assert!(matches!(parse_data_line(""), Ok(None)));
        assert!(parse_data_line("data: {broken").is_err());
    }

    #[tokio::test]
    async fn splits_across_chunk_boundaries() {
        let got = collect_lines(&["data: {\"a\"", ":1}\r\n\r\ndata: 2\n", "tail"]).await;
        assert_eq!(got, vec!["data: {\"a\":1}", "", "data: 2", "tail"]);
    }

    #[tokio::test]
    async fn read_error_ends_stream() {
        let items: Vec<Result<Bytes, GatewayError>> = vec![
            Ok(Bytes::from_static(b"data: 1\n")),
            Err(GatewayError::UpstreamStatus {
                endpoint: "http://signal/api/alerts/stream".to_string(),
                status: 502,
            }),
            Ok(Bytes::from_static(b"data: 2\n")),
        ];
        let got: Vec<Result<String, GatewayError>> =
            lines(futures_util::stream::iter(items)).collect().await;
        assert_eq!(got.len(), 2);
        assert!(matches!(got.first(), Some(Ok(line)) if line == "data: 1"));
        assert!(matches!(got.get(1), Some(Err(_))));
    }

    #[tokio::test]
    async fn oversized_line_is_dropped_and_stream_continues() {
        let oversized = vec![b'x'; MAX_LINE_BYTES + 1];
        let items: Vec<Result<Bytes, GatewayError>> = vec![
            Ok(Bytes::from_static(b"data: 1\n")),
            Ok(Bytes::from(oversized.clone())),
            Ok(Bytes::from(oversized)),
            Ok(Bytes::from_static(b"still the same line\ndata: 2\n")),
        ];
        let got: Vec<String> = lines(futures_util::stream::iter(items))
            .map(|line| match line {
                Ok(line) => line,
                Err(e) => panic!("unexpected error: {e}"),
            })
            .collect()
            .await;
        assert_eq!(got, vec!["data: 1", "data: 2"]);
    }

    #[tokio::test]
    async fn line_at_the_limit_is_kept() {
        let mut line = vec![b'y'; MAX_LINE_BYTES];
        line.push(b'\n');
        let items: Vec<Result<Bytes, GatewayError>> = vec![Ok(Bytes::from(line))];
        let got: Vec<Result<String, GatewayError>> =
            lines(futures_util::stream::iter(items)).collect().await;
        assert_eq!(got.len(), 1);
        assert!(matches!(got.first(), Some(Ok(text)) if text.len() == MAX_LINE_BYTES));
    }
}
