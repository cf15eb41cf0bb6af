//! Typed answer-stream events

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Discriminants carried in a payload's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    End,
    Id,
    Thought,
    Source,
    ToolCall,
    Error,
    StructuredAnswer,
    WorkflowStep,
}

impl EventKind {
    /// Kinds understood by every call site
    pub const COMMON: &'static [EventKind] = &[
        EventKind::End,
        EventKind::Thought,
        EventKind::Source,
        EventKind::ToolCall,
        EventKind::Error,
    ];

    /// Look up a kind by its wire name
    pub fn from_type(name: &str) -> Option<Self> {
        Some(match name {
            "end" => EventKind::End,
            "id" => EventKind::Id,
            "thought" => EventKind::Thought,
            "source" => EventKind::Source,
            "tool_call" => EventKind::ToolCall,
            "error" => EventKind::Error,
            "structured_answer" => EventKind::StructuredAnswer,
            "workflow_step" => EventKind::WorkflowStep,
            _ => return None,
        })
    }

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::End => "end",
            EventKind::Id => "id",
            EventKind::Thought => "thought",
            EventKind::Source => "source",
            EventKind::ToolCall => "tool_call",
            EventKind::Error => "error",
            EventKind::StructuredAnswer => "structured_answer",
            EventKind::WorkflowStep => "workflow_step",
        }
    }
}

/// One retrieved document backing an answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Any other fields the service attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Source {
    /// Title with any leading path segments removed
    pub fn short_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(|title| title.split('/').next_back().unwrap_or(title))
    }
}

/// A tool invocation, keyed by its stable `call_id`.
///
/// Every other field is kept as free-form JSON so that partial updates can be
/// merged over earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call with no fields besides its id
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Shallow-merge an update: its fields win, fields it lacks survive.
    pub fn merge(&mut self, update: ToolCall) {
        self.fields.extend(update.fields);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.get("tool_name").and_then(Value::as_str)
    }

    pub fn action_name(&self) -> Option<&str> {
        self.get("action_name").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }
}

/// Execution status of a workflow node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// A status this client does not know about
    Other(String),
}

impl StepStatus {
    /// Whether the node has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl From<String> for StepStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => StepStatus::Pending,
            "running" => StepStatus::Running,
            "completed" => StepStatus::Completed,
            "failed" => StepStatus::Failed,
            _ => StepStatus::Other(s),
        }
    }
}

impl From<StepStatus> for String {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Pending => "pending".to_string(),
            StepStatus::Running => "running".to_string(),
            StepStatus::Completed => "completed".to_string(),
            StepStatus::Failed => "failed".to_string(),
            StepStatus::Other(s) => s,
        }
    }
}

/// Progress report for one workflow node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepUpdate {
    pub node_id: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub node_title: String,
    pub status: StepStatus,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub state_snapshot: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A decoded answer-stream payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Producer finished the answer
    End,
    /// Server assigned or confirmed the conversation id
    ConversationId { id: String },
    /// Reasoning text delta
    Thought { thought: String },
    /// Retrieved sources
    Source { sources: Vec<Source> },
    /// Tool invocation create-or-update
    ToolCall { call: ToolCall },
    /// Application-level failure reported by the producer
    Error { error: String },
    /// Complete structured answer, replacing anything streamed so far
    StructuredAnswer {
        answer: String,
        structured: Option<Value>,
        schema: Option<Value>,
    },
    /// Workflow node progress
    WorkflowStep(WorkflowStepUpdate),
    /// Answer text delta (untyped fallback)
    Answer { answer: String },
    /// Nothing this call site acts on
    Ignored,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
struct ThoughtPayload {
    #[serde(default)]
    thought: String,
}

#[derive(Deserialize)]
struct SourcePayload {
    #[serde(default)]
    source: Option<Vec<Source>>,
}

#[derive(Deserialize)]
struct ToolCallPayload {
    data: ToolCall,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StructuredAnswerPayload {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    structured: Option<Value>,
    #[serde(default)]
    schema: Option<Value>,
}

impl StreamEvent {
    /// Decode one payload string.
    ///
    /// Typed branches are taken only for kinds listed in `recognized`; any
    /// other payload falls back to an answer delta when it carries an
    /// `answer` string and is ignored otherwise.
    pub fn decode(payload: &str, recognized: &[EventKind]) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(value, recognized)
    }

    /// Decode an already-parsed payload object
    pub fn from_value(value: Value, recognized: &[EventKind]) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .and_then(EventKind::from_type)
            .filter(|kind| recognized.contains(kind));

        let Some(kind) = kind else {
            return Ok(match value.get("answer").and_then(Value::as_str) {
                Some(answer) => StreamEvent::Answer {
                    answer: answer.to_string(),
                },
                None => StreamEvent::Ignored,
            });
        };

        Ok(match kind {
            EventKind::End => StreamEvent::End,
            EventKind::Id => {
                let p: IdPayload = serde_json::from_value(value)?;
                StreamEvent::ConversationId { id: p.id }
            }
            EventKind::Thought => {
                let p: ThoughtPayload = serde_json::from_value(value)?;
                StreamEvent::Thought { thought: p.thought }
            }
            EventKind::Source => {
                let p: SourcePayload = serde_json::from_value(value)?;
                StreamEvent::Source {
                    sources: p.source.unwrap_or_default(),
                }
            }
            EventKind::ToolCall => {
                let p: ToolCallPayload = serde_json::from_value(value)?;
                StreamEvent::ToolCall { call: p.data }
            }
            EventKind::Error => {
                let p: ErrorPayload = serde_json::from_value(value)?;
                StreamEvent::Error {
                    error: p.error.unwrap_or_default(),
                }
            }
            EventKind::StructuredAnswer => {
                let p: StructuredAnswerPayload = serde_json::from_value(value)?;
                StreamEvent::StructuredAnswer {
                    answer: p.answer,
                    structured: p.structured,
                    schema: p.schema,
                }
            }
            EventKind::WorkflowStep => StreamEvent::WorkflowStep(serde_json::from_value(value)?),
        })
    }

    /// Check if this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error { .. })
    }
}
