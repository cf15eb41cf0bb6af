//! Call sites of the pipeline: plain chat, agent preview, workflow preview.
//!
//! A variant decides which event kinds it acts on and how the request body
//! is built. Decoding and control flow are shared.

use quill_wire::{AgentDefinition, AnswerRequest, EventKind, HistoryEntry, WorkflowDefinition};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request settings supplied by the source and prompt registries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub prompt_id: Option<String>,
    /// Retrieval breadth
    pub chunks: Option<u32>,
    pub token_limit: Option<u32>,
    pub active_docs: Option<String>,
    pub retriever: Option<String>,
}

/// Inputs for building one request body
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub question: &'a str,
    pub history: &'a [HistoryEntry],
    pub conversation_id: Option<&'a str>,
    pub options: &'a RequestOptions,
}

impl RequestContext<'_> {
    /// Body fields shared by every variant
    pub fn base_request(&self) -> Result<AnswerRequest> {
        let mut request =
            AnswerRequest::new(self.question, self.history)?.with_chunks(self.options.chunks);
        request.prompt_id = self.options.prompt_id.clone();
        request.token_limit = self.options.token_limit;
        request.active_docs = self.options.active_docs.clone();
        request.retriever = self.options.retriever.clone();
        Ok(request)
    }
}

/// Parametrization of the pipeline for one call site
pub trait ChatVariant: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Event kinds this call site acts on; other payloads fall back to answer deltas
    fn recognized(&self) -> &'static [EventKind];

    /// Build the request body
    fn build_request(&self, ctx: &RequestContext<'_>) -> Result<AnswerRequest>;

    /// Whether workflow progress is tracked for this call site
    fn tracks_execution(&self) -> bool {
        false
    }
}

const CONVERSATION_KINDS: &[EventKind] = &[
    EventKind::End,
    EventKind::Id,
    EventKind::Thought,
    EventKind::Source,
    EventKind::ToolCall,
    EventKind::Error,
];

const WORKFLOW_KINDS: &[EventKind] = &[
    EventKind::End,
    EventKind::Thought,
    EventKind::Source,
    EventKind::ToolCall,
    EventKind::Error,
    EventKind::StructuredAnswer,
    EventKind::WorkflowStep,
];

/// Plain documentation chat, persisted by the service
#[derive(Debug, Clone, Default)]
pub struct ConversationVariant;

impl ChatVariant for ConversationVariant {
    fn name(&self) -> &'static str {
        "conversation"
    }

    fn recognized(&self) -> &'static [EventKind] {
        CONVERSATION_KINDS
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> Result<AnswerRequest> {
        let mut request = ctx.base_request()?;
        request.conversation_id = ctx.conversation_id.map(str::to_string);
        Ok(request)
    }
}

/// Chat against an unsaved agent configuration
#[derive(Debug, Clone, Default)]
pub struct AgentPreviewVariant {
    pub agent: AgentDefinition,
}

impl AgentPreviewVariant {
    pub fn new(agent: AgentDefinition) -> Self {
        Self { agent }
    }
}

impl ChatVariant for AgentPreviewVariant {
    fn name(&self) -> &'static str {
        "agent-preview"
    }

    fn recognized(&self) -> &'static [EventKind] {
        EventKind::COMMON
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> Result<AnswerRequest> {
        let mut request = ctx.base_request()?;
        request.agent = Some(self.agent.clone());
        request.save_conversation = Some(false);
        Ok(request)
    }
}

/// Run of an unsaved workflow graph, with per-node progress
#[derive(Debug, Clone, Default)]
pub struct WorkflowPreviewVariant {
    pub workflow: WorkflowDefinition,
}

impl WorkflowPreviewVariant {
    pub fn new(workflow: WorkflowDefinition) -> Self {
        Self { workflow }
    }
}

impl ChatVariant for WorkflowPreviewVariant {
    fn name(&self) -> &'static str {
        "workflow-preview"
    }

    fn recognized(&self) -> &'static [EventKind] {
        WORKFLOW_KINDS
    }

    fn build_request(&self, ctx: &RequestContext<'_>) -> Result<AnswerRequest> {
        let mut request = ctx.base_request()?;
        request.workflow = Some(self.workflow.clone());
        request.save_conversation = Some(false);
        Ok(request)
    }

    fn tracks_execution(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> RequestOptions {
        RequestOptions {
            prompt_id: Some("default".into()),
            chunks: Some(2),
            token_limit: Some(2000),
            active_docs: Some("local/docs".into()),
            retriever: None,
        }
    }

    #[test]
    fn test_conversation_request_carries_id_and_options() {
        let options = options();
        let history = vec![HistoryEntry {
            prompt: "hi".into(),
            response: "hello".into(),
            tool_calls: None,
        }];
        let ctx = RequestContext {
            question: "What is X?",
            history: &history,
            conversation_id: Some("conv-1"),
            options: &options,
        };

        let body = serde_json::to_value(ConversationVariant.build_request(&ctx).unwrap()).unwrap();
        assert_eq!(body["question"], json!("What is X?"));
        assert_eq!(body["conversation_id"], json!("conv-1"));
        assert_eq!(body["prompt_id"], json!("default"));
        assert_eq!(body["chunks"], json!("2"));
        assert_eq!(body["token_limit"], json!(2000));
        assert_eq!(body["active_docs"], json!("local/docs"));
        assert!(body.get("save_conversation").is_none());
        assert!(body["history"].as_str().unwrap().contains("hello"));
    }

    #[test]
    fn test_previews_do_not_persist() {
        let options = RequestOptions::default();
        let ctx = RequestContext {
            question: "q",
            history: &[],
            conversation_id: Some("ignored"),
            options: &options,
        };

        let agent = AgentPreviewVariant::new(AgentDefinition(
            json!({"agent_id": "a1", "name": "helper"})
                .as_object()
                .cloned()
                .unwrap(),
        ));
        let body = serde_json::to_value(agent.build_request(&ctx).unwrap()).unwrap();
        assert_eq!(body["save_conversation"], json!(false));
        assert_eq!(body["conversation_id"], json!(null));
        assert_eq!(body["agent_id"], json!("a1"));
        assert_eq!(body["name"], json!("helper"));
        assert!(body.get("agent").is_none());

        let workflow = WorkflowPreviewVariant::new(WorkflowDefinition {
            name: "triage".into(),
            nodes: vec![json!({"id": "start"})],
            edges: vec![],
        });
        let body = serde_json::to_value(workflow.build_request(&ctx).unwrap()).unwrap();
        assert_eq!(body["save_conversation"], json!(false));
        assert_eq!(body["workflow"]["nodes"][0]["id"], json!("start"));
        assert!(workflow.tracks_execution());
    }

    #[test]
    fn test_only_workflow_recognizes_workflow_events() {
        assert!(!ConversationVariant.recognized().contains(&EventKind::WorkflowStep));
        assert!(!AgentPreviewVariant::default()
            .recognized()
            .contains(&EventKind::StructuredAnswer));
        let workflow = WorkflowPreviewVariant::default();
        assert!(workflow.recognized().contains(&EventKind::WorkflowStep));
        assert!(workflow.recognized().contains(&EventKind::StructuredAnswer));
        assert!(ConversationVariant.recognized().contains(&EventKind::Id));
    }
}
