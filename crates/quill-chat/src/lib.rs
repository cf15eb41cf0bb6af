//! quill-chat: streaming answer pipeline
//!
//! This crate owns conversation state and drives one cancellable answer
//! request at a time, folding stream events into the turn they target.

pub mod dispatch;
pub mod error;
pub mod events;
pub mod handle;
pub mod pipeline;
pub mod resolve;
pub mod turn;
pub mod variant;

pub use dispatch::{Applied, DropReason, apply_event};
pub use error::{Error, Result};
pub use events::{PipelineEvent, RequestOutcome};
pub use handle::PipelineHandle;
pub use pipeline::{AnswerMode, GENERIC_ERROR, Pipeline, PipelineConfig};
pub use resolve::{RetryPolicy, Submission, SubmissionMode, apply_submission, resolve_submission};
pub use turn::{Conversation, ExecutionStep, Status, Target, Turn};
pub use variant::{
    AgentPreviewVariant, ChatVariant, ConversationVariant, RequestContext, RequestOptions,
    WorkflowPreviewVariant,
};
