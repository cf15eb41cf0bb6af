//! quill-wire: answer-stream wire layer
//!
//! This crate turns the answer service's byte stream into typed events and
//! provides the transports that fetch it.

pub mod error;
pub mod event;
pub mod frame;
pub mod request;
pub mod transport;

pub use error::{Error, Result};
pub use event::{EventKind, Source, StepStatus, StreamEvent, ToolCall, WorkflowStepUpdate};
pub use frame::{FrameDecoder, frame_payloads};
pub use request::{AgentDefinition, AnswerRequest, HistoryEntry, WorkflowDefinition};
pub use transport::{AnswerResponse, AnswerTransport, ByteStream, HttpTransport, ReplayTransport};
