//! Transports that fetch answers from the service

pub mod http;
pub mod replay;

pub use http::HttpTransport;
pub use replay::ReplayTransport;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    event::{Source, ToolCall},
    request::AnswerRequest,
};

/// Raw response body chunks of a streaming answer
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Complete answer returned by the blocking endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Transport for answer requests
#[async_trait]
pub trait AnswerTransport: Send + Sync {
    /// Open a streaming answer. The returned stream stops once `cancel` fires.
    async fn stream(&self, request: &AnswerRequest, cancel: CancellationToken)
    -> Result<ByteStream>;

    /// Fetch a complete answer in one round trip
    async fn answer(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerResponse>;
}
