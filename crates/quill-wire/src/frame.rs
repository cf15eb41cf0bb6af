//! Line framing for the answer stream
//!
//! The service writes one JSON object per line, optionally prefixed with
//! `data:`. Chunk boundaries carry no meaning, so a partial line is held back
//! until its newline arrives.

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::Result;

/// Prefix marking a payload line. A following space is not part of the prefix.
pub const DATA_PREFIX: &str = "data:";

/// Incremental decoder from byte chunks to payload strings
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the payloads of every line it completed.
    ///
    /// The buffer is split on the newline byte before decoding, so a UTF-8
    /// sequence cut between two chunks is rejoined first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(parse_line)
            .collect()
    }

    /// Number of bytes held for a line that has not been terminated yet
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Extract the payload from one complete line, if it carries one.
fn parse_line(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(line);
    text.strip_prefix(DATA_PREFIX).map(str::to_string)
}

/// Adapt a byte-chunk stream into a stream of payload strings.
///
/// A transport error is yielded once and ends the stream. An unterminated
/// trailing line at EOF is discarded.
pub fn frame_payloads<S>(chunks: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    stream! {
        let mut chunks = chunks;
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    for payload in decoder.push(&bytes) {
                        yield Ok(payload);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if decoder.pending() > 0 {
            tracing::debug!(
                "Stream ended with {} bytes of unterminated line, discarding",
                decoder.pending()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_payload_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(
            decoder
                .push(br#"data:{"type":"thought","thought":"ab"#)
                .is_empty()
        );
        let payloads = decoder.push(b"c\"}\n");
        assert_eq!(payloads, vec![r#"{"type":"thought","thought":"abc"}"#]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data:{\"answer\":\"a\"}\n\ndata:{\"answer\":\"b\"}\ndata:{\"ans");
        assert_eq!(payloads, vec![r#"{"answer":"a"}"#, r#"{"answer":"b"}"#]);
        assert_eq!(decoder.pending(), "data:{\"ans".len());
    }

    #[test]
    fn test_space_after_prefix_is_kept() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data: {\"type\":\"end\"}\n");
        assert_eq!(payloads, vec![r#" {"type":"end"}"#]);
    }

    #[test]
    fn test_lines_without_prefix_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"event: message\n: keepalive\n{\"answer\":\"x\"}\n");
        assert!(payloads.is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data:{\"type\":\"end\"}\r\n\r\n");
        assert_eq!(payloads, vec![r#"{"type":"end"}"#]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let line = "data:{\"answer\":\"h\u{e9}llo\"}\n".as_bytes();
        // Split inside the two-byte encoding of 'é'
        let cut = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&line[..cut]).is_empty());
        let payloads = decoder.push(&line[cut..]);
        assert_eq!(payloads, vec!["{\"answer\":\"h\u{e9}llo\"}"]);
    }

    #[tokio::test]
    async fn test_stream_does_not_flush_partial_line() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data:{\"answer\":\"one\"}\ndata:{\"answ")),
            Ok(Bytes::from_static(b"er\":\"two\"}")),
        ]);

        let payloads: Vec<String> = frame_payloads(chunks)
            .map(|p| p.unwrap())
            .collect()
            .await;
        assert_eq!(payloads, vec![r#"{"answer":"one"}"#]);
    }

    #[tokio::test]
    async fn test_stream_stops_after_transport_error() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data:{\"answer\":\"one\"}\n")),
            Err(Error::Transport("connection reset".into())),
            Ok(Bytes::from_static(b"data:{\"answer\":\"two\"}\n")),
        ]);

        let items: Vec<Result<String>> = frame_payloads(chunks).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Transport(_))));
    }
}
