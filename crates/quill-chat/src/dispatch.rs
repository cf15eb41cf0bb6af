//! Fold stream events into conversation state.
//!
//! Each event produces exactly one mutation. Nothing here awaits, so an index
//! resolved at the top of [`apply_event`] is still valid when it is written.

use quill_wire::{StreamEvent, ToolCall, WorkflowStepUpdate};

use crate::turn::{Conversation, ExecutionStep, Status, Target};

/// Why an event left the state untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Text delta arrived after the pipeline went idle
    Idle,
    /// No turn exists at the target
    NoTarget,
    /// The event carries nothing to apply
    Ignored,
}

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State changed
    Mutated,
    /// State changed and the stream reached a terminal status
    Terminal,
    /// State unchanged
    Dropped(DropReason),
}

/// Apply one event to the turn at `target`.
///
/// `now_ms` stamps workflow steps.
pub fn apply_event(
    conv: &mut Conversation,
    event: StreamEvent,
    target: Target,
    now_ms: i64,
) -> Applied {
    let index = conv.resolve_target(target);

    match event {
        StreamEvent::End => {
            conv.status = Status::Idle;
            Applied::Terminal
        }
        StreamEvent::ConversationId { id } => {
            conv.conversation_id = Some(id);
            Applied::Mutated
        }
        StreamEvent::Thought { thought } => {
            if conv.status == Status::Idle {
                return Applied::Dropped(DropReason::Idle);
            }
            let Some(index) = index else {
                return Applied::Dropped(DropReason::NoTarget);
            };
            conv.turns[index].thought.push_str(&thought);
            Applied::Mutated
        }
        StreamEvent::Answer { answer } => {
            if conv.status == Status::Idle {
                return Applied::Dropped(DropReason::Idle);
            }
            let Some(index) = index else {
                return Applied::Dropped(DropReason::NoTarget);
            };
            conv.turns[index].response.push_str(&answer);
            Applied::Mutated
        }
        StreamEvent::Source { sources } => {
            let Some(index) = index else {
                return Applied::Dropped(DropReason::NoTarget);
            };
            let turn = &mut conv.turns[index];
            if let Some(existing) = turn.sources.as_mut() {
                existing.extend(sources);
            } else {
                turn.sources = Some(sources);
            }
            Applied::Mutated
        }
        StreamEvent::ToolCall { call } => {
            let Some(index) = index else {
                return Applied::Dropped(DropReason::NoTarget);
            };
            upsert_tool_call(
                conv.turns[index].tool_calls.get_or_insert_with(Vec::new),
                call,
            );
            Applied::Mutated
        }
        StreamEvent::Error { error } => {
            conv.set_error(target, error);
            Applied::Terminal
        }
        StreamEvent::StructuredAnswer {
            answer,
            structured,
            schema,
        } => {
            let Some(index) = index else {
                return Applied::Dropped(DropReason::NoTarget);
            };
            let turn = &mut conv.turns[index];
            turn.response = answer;
            turn.structured = structured;
            turn.schema = schema;
            Applied::Mutated
        }
        StreamEvent::WorkflowStep(update) => {
            if let Some(index) = index {
                upsert_step(&mut conv.turns[index].execution_steps, &update, now_ms);
            }
            let applied = upsert_step(&mut conv.execution_steps, &update, now_ms);
            if applied && update.status == quill_wire::StepStatus::Running {
                conv.active_node_id = Some(update.node_id.clone());
            }
            Applied::Mutated
        }
        StreamEvent::Ignored => Applied::Dropped(DropReason::Ignored),
    }
}

/// Merge `call` into the entry with the same `call_id`, or append it.
pub fn upsert_tool_call(calls: &mut Vec<ToolCall>, call: ToolCall) {
    match calls.iter_mut().find(|c| c.call_id == call.call_id) {
        Some(existing) => existing.merge(call),
        None => calls.push(call),
    }
}

/// Merge a workflow update into the step with the same `node_id`, or append one.
///
/// `started_at` is fixed on first sight. `completed_at` is stamped once, on
/// the first terminal status, and a terminal step never moves back to a
/// non-terminal status.
///
/// Returns `false` when the update's status was rejected for that reason.
pub fn upsert_step(
    steps: &mut Vec<ExecutionStep>,
    update: &WorkflowStepUpdate,
    now_ms: i64,
) -> bool {
    let Some(step) = steps.iter_mut().find(|s| s.node_id == update.node_id) else {
        steps.push(ExecutionStep {
            node_id: update.node_id.clone(),
            node_type: update.node_type.clone(),
            node_title: update.node_title.clone(),
            status: update.status.clone(),
            reasoning: update.reasoning.clone(),
            state_snapshot: update.state_snapshot.clone(),
            output: update.output.clone(),
            error: update.error.clone(),
            started_at: now_ms,
            completed_at: update.status.is_terminal().then_some(now_ms),
        });
        return true;
    };

    if !update.node_type.is_empty() {
        step.node_type = update.node_type.clone();
    }
    if !update.node_title.is_empty() {
        step.node_title = update.node_title.clone();
    }
    if update.reasoning.is_some() {
        step.reasoning = update.reasoning.clone();
    }
    if update.state_snapshot.is_some() {
        step.state_snapshot = update.state_snapshot.clone();
    }
    if update.output.is_some() {
        step.output = update.output.clone();
    }
    if update.error.is_some() {
        step.error = update.error.clone();
    }

    if step.status.is_terminal() && !update.status.is_terminal() {
        tracing::debug!(
            "Ignoring late {:?} for finished node {}",
            update.status,
            update.node_id
        );
        return false;
    }
    step.status = update.status.clone();
    if step.status.is_terminal() && step.completed_at.is_none() {
        step.completed_at = Some(now_ms);
    }
    true
}
