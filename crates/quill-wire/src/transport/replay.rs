//! Replay a captured answer body without a network

use std::{path::Path, time::Duration};

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{AnswerResponse, AnswerTransport, ByteStream};
use crate::{
    error::{Error, Result},
    request::AnswerRequest,
};

/// Default number of bytes handed out per chunk
const DEFAULT_CHUNK_SIZE: usize = 64;

/// Serves a fixed response body, split into fixed-size chunks.
///
/// Every request is recorded so callers can inspect what would have been sent.
pub struct ReplayTransport {
    body: Bytes,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl ReplayTransport {
    /// Create a replay of an in-memory body
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Load a captured body from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let body = std::fs::read(path)?;
        Ok(Self::new(body))
    }

    /// Set the chunk size (at least one byte)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause between chunks to mimic a slow producer
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<AnswerRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AnswerTransport for ReplayTransport {
    async fn stream(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream> {
        self.requests.lock().push(request.clone());
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }

        let body = self.body.clone();
        let chunk_size = self.chunk_size;
        let delay = self.chunk_delay;

        Ok(Box::pin(stream! {
            let mut offset = 0;
            while offset < body.len() {
                if let Some(delay) = delay {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                } else {
                    tokio::task::yield_now().await;
                }

                if cancel.is_cancelled() {
                    yield Err(Error::Aborted);
                    return;
                }

                let end = (offset + chunk_size).min(body.len());
                yield Ok(body.slice(offset..end));
                offset = end;
            }
        }))
    }

    async fn answer(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerResponse> {
        self.requests.lock().push(request.clone());
        if cancel.is_cancelled() {
            return Err(Error::Aborted);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_replay_chunks_body() {
        let transport = ReplayTransport::new("abcdefg").with_chunk_size(3);
        let request = AnswerRequest::new("q", &[]).unwrap();

        let stream = transport
            .stream(&request, CancellationToken::new())
            .await
            .unwrap();
        let chunks: Vec<Bytes> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec!["abc", "def", "g"]);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(transport.requests()[0].question, "q");
    }

    #[tokio::test]
    async fn test_replay_stops_on_cancel() {
        let transport = ReplayTransport::new("abcdef").with_chunk_size(2);
        let request = AnswerRequest::new("q", &[]).unwrap();
        let cancel = CancellationToken::new();

        let mut stream = transport.stream(&request, cancel.clone()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "ab");
        cancel.cancel();
        assert!(matches!(stream.next().await, Some(Err(Error::Aborted))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_answer_parses_json() {
        let transport = ReplayTransport::new(
            r#"{"answer":"42","sources":[{"title":"a/b.md"}],"conversation_id":"c9"}"#,
        );
        let request = AnswerRequest::new("q", &[]).unwrap();

        let response = transport
            .answer(&request, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.answer, "42");
        assert_eq!(response.conversation_id.as_deref(), Some("c9"));
        assert_eq!(response.sources.unwrap()[0].short_title(), Some("b.md"));
    }

    #[tokio::test]
    async fn test_replay_refuses_cancelled_request() {
        let transport = ReplayTransport::new("data:{}\n");
        let request = AnswerRequest::new("q", &[]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(
            transport.stream(&request, cancel).await,
            Err(Error::Aborted)
        ));
    }
}
