//! Incremental newline-delimited JSON decoding.
//!
//! The server streams one JSON record per line. Network chunks carry no
//! alignment guarantee: a chunk may end in the middle of a line or in the
//! middle of a multi-byte character. [`LineDecoder`] keeps the unterminated
//! tail between chunks and only decodes a line once its `\n` has arrived.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::warn;

const LOG_EXCERPT_CHARS: usize = 120;

/// Splits a byte stream into lines and parses each non-empty line as JSON.
///
/// Lines that are not valid UTF-8 or not valid JSON are dropped with a
/// warning; decoding carries on with the next line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    // Bytes of `buf` already known to contain no newline.
    scanned: usize,
}

impl LineDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every JSON value completed by it, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buf.extend_from_slice(chunk);
        let mut values = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buf[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + offset;
            if let Some(value) = parse_line(&self.buf[line_start..line_end]) {
                values.push(value);
            }
            line_start = line_end + 1;
            search_from = line_start;
        }
        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        values
    }

    /// Parses whatever is left after the input ended without a final newline.
    pub fn finish(&mut self) -> Option<Value> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        parse_line(&rest)
    }

    /// Number of buffered bytes belonging to the current unterminated line.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

fn parse_line(bytes: &[u8]) -> Option<Value> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, len = bytes.len(), "dropping stream line that is not valid UTF-8");
            return None;
        }
    };
    let line = text.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, line = %excerpt(line), "dropping malformed JSON line");
            None
        }
    }
}

fn excerpt(line: &str) -> String {
    line.chars().take(LOG_EXCERPT_CHARS).collect()
}

/// Adapts a stream of byte chunks into a stream of JSON values.
///
/// An upstream error is forwarded once and ends the sequence. The upstream
/// stream is dropped as soon as it ends or fails, and with the returned
/// stream otherwise.
pub fn decode_json_lines<S, E>(upstream: S) -> impl Stream<Item = Result<Value, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    struct State<S> {
        upstream: Option<S>,
        decoder: LineDecoder,
        pending: VecDeque<Value>,
    }

    stream::unfold(
        State {
            upstream: Some(upstream),
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(value) = state.pending.pop_front() {
                    return Some((Ok(value), state));
                }
                let upstream = state.upstream.as_mut()?;
                match upstream.next().await {
                    Some(Ok(chunk)) => {
                        let values = state.decoder.push_chunk(&chunk);
                        state.pending.extend(values);
                    }
                    Some(Err(err)) => {
                        state.upstream = None;
                        return Some((Err(err), state));
                    }
                    None => {
                        state.upstream = None;
                        if let Some(value) = state.decoder.finish() {
                            state.pending.push_back(value);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<Value> {
        let mut decoder = LineDecoder::new();
        let mut values = Vec::new();
        for chunk in chunks {
            values.extend(decoder.push_chunk(chunk));
        }
        values.extend(decoder.finish());
        values
    }

    #[test]
    fn splits_complete_lines() {
        let values = decode_chunks(&[b"{\"a\":1}\n{\"b\":2}\n"]);
        assert_eq!(values, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[test]
    fn every_split_point_yields_the_same_values() {
        let input = "{\"text\":\"héllo 日本\"}\n{\"n\":2}\n\n{\"emoji\":\"🦀\"}".as_bytes();
        let expected = vec![
            json!({"text":"héllo 日本"}),
            json!({"n":2}),
            json!({"emoji":"🦀"}),
        ];
        for split in 0..=input.len() {
            let (head, tail) = input.split_at(split);
            assert_eq!(decode_chunks(&[head, tail]), expected, "split at {split}");
        }
    }

    #[test]
    fn byte_by_byte_chunks_decode_multibyte_text() {
        let input = "{\"text\":\"ünïcödé\"}\n".as_bytes();
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(decode_chunks(&chunks), vec![json!({"text":"ünïcödé"})]);
    }

    #[test]
    fn malformed_line_is_dropped_and_decoding_continues() {
        let values = decode_chunks(&[b"{\"a\":1}\nNOT-JSON\n{\"b\":2}\n"]);
        assert_eq!(values, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[test]
    fn invalid_utf8_line_is_dropped() {
        let values = decode_chunks(&[b"{\"a\":1}\n\xff\xfe\n{\"b\":2}\n"]);
        assert_eq!(values, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[test]
    fn trailing_unterminated_line_is_parsed_on_finish() {
        let mut decoder = LineDecoder::new();
        let values = decoder.push_chunk(b"{\"a\":1}\n{\"b\":2}");
        assert_eq!(values, vec![json!({"a":1})]);
        assert_eq!(decoder.finish(), Some(json!({"b":2})));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let values = decode_chunks(&[b"\r\n  \n{\"a\":1}\r\n\r\n{\"b\":2}\r\n"]);
        assert_eq!(values, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[test]
    fn buffer_only_holds_the_partial_line() {
        let mut decoder = LineDecoder::new();
        let _ = decoder.push_chunk(b"{\"a\":1}\n{\"b\":");
        assert_eq!(decoder.buffered_len(), "{\"b\":".len());
        let values = decoder.push_chunk(b"2}\n");
        assert_eq!(values, vec![json!({"b":2})]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[tokio::test]
    async fn stream_adapter_yields_values_across_chunks() {
        let chunks: Vec<Result<Bytes, &'static str>> = vec![
            Ok(Bytes::from_static(b"{\"a\"")),
            Ok(Bytes::from_static(b":1}\nbroken\n{\"b\":2}")),
        ];
        let values: Vec<_> = decode_json_lines(stream::iter(chunks)).collect().await;
        assert_eq!(values, vec![Ok(json!({"a":1})), Ok(json!({"b":2}))]);
    }

    #[tokio::test]
    async fn stream_adapter_forwards_upstream_error_once_and_ends() {
        let chunks: Vec<Result<Bytes, &'static str>> = vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"partial\"")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"{\"never\":true}\n")),
        ];
        let values: Vec<_> = decode_json_lines(stream::iter(chunks)).collect().await;
        assert_eq!(values, vec![Ok(json!({"a":1})), Err("connection reset")]);
    }
}
