//! Outbound answer request body

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::Result, event::ToolCall};

/// One earlier exchange sent back to the service as context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// An unsaved workflow graph run in preview mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
}

/// An unsaved agent configuration run in preview mode.
///
/// The service owns the schema, so the definition is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentDefinition(pub Map<String, Value>);

/// Body of a `/stream` or `/api/answer` request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnswerRequest {
    pub question: String,
    /// JSON-encoded list of [`HistoryEntry`]
    pub history: String,
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    /// Retrieval breadth, sent as a stringified integer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_docs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retriever: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowDefinition>,
    /// Agent fields sit at the top level of the body
    #[serde(flatten)]
    pub agent: Option<AgentDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_conversation: Option<bool>,
}

impl AnswerRequest {
    /// Create a request for a question with the given history
    pub fn new(question: impl Into<String>, history: &[HistoryEntry]) -> Result<Self> {
        Ok(Self {
            question: question.into(),
            history: serde_json::to_string(history)?,
            ..Default::default()
        })
    }

    /// Set the retrieval breadth
    pub fn with_chunks(mut self, chunks: Option<u32>) -> Self {
        self.chunks = chunks.map(|c| c.to_string());
        self
    }
}
