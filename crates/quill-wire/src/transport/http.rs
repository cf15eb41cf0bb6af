//! HTTP transport for the answer service

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{AnswerResponse, AnswerTransport, ByteStream};
use crate::{
    error::{Error, Result},
    request::AnswerRequest,
};

/// Streaming endpoint, relative to the base URL
const STREAM_PATH: &str = "stream";
/// Blocking endpoint, relative to the base URL
const ANSWER_PATH: &str = "api/answer";

/// Answer service client over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for a service base URL (e.g. `http://localhost:7091`)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a transport reusing an existing client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// POST the request and wait for response headers, racing cancellation.
    async fn send(
        &self,
        path: &str,
        request: &AnswerRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let pending = self.client.post(&url).json(request).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = pending => response?,
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status, body));
        }

        Ok(response)
    }
}

#[async_trait]
impl AnswerTransport for HttpTransport {
    async fn stream(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<ByteStream> {
        let response = self.send(STREAM_PATH, request, &cancel).await?;
        let mut body = Box::pin(response.bytes_stream());

        Ok(Box::pin(stream! {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(Err(Error::Aborted)),
                    chunk = body.next() => chunk.map(|c| c.map_err(Error::from)),
                };

                match next {
                    Some(Ok(bytes)) => yield Ok(bytes),
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    None => return,
                }
            }
        }))
    }

    async fn answer(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerResponse> {
        let response = self.send(ANSWER_PATH, request, &cancel).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Aborted),
            body = response.json::<AnswerResponse>() => Ok(body?),
        }
    }
}
