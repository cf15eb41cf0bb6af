//! Pipeline event types

use serde::{Deserialize, Serialize};

use crate::turn::Status;

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Stream ended or answer arrived
    Completed,
    /// Transport or producer failure
    Failed,
    /// Stopped by the caller or replaced by a newer request
    Cancelled,
}

/// Events emitted as the pipeline changes state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A request was issued for the turn at `index`
    RequestStart { generation: u64, index: usize },

    /// The turn list changed shape (append, edit or reset)
    TurnsChanged { len: usize },

    /// Content of one turn changed
    TurnUpdated { index: usize },

    /// Pipeline status changed
    StatusChanged { status: Status },

    /// The service assigned a conversation id
    ConversationId { id: String },

    /// A workflow node reported progress
    StepUpdated { node_id: String },

    /// A request stopped driving the pipeline
    RequestEnd {
        generation: u64,
        outcome: RequestOutcome,
    },
}

impl PipelineEvent {
    /// Check if this event ends a request
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::RequestEnd { .. })
    }
}
