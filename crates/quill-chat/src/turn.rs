//! Conversation state: turns, status and workflow progress.

use quill_wire::{HistoryEntry, Source, StepStatus, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pipeline status. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Failed,
}

/// One workflow node's execution record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub node_id: String,
    pub node_type: String,
    pub node_title: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_snapshot: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix millis when the node was first reported
    pub started_at: i64,
    /// Unix millis when the node first reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// One prompt and its evolving answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub prompt: String,
    /// Answer text, appended delta by delta
    #[serde(default)]
    pub response: String,
    /// Reasoning text, appended delta by delta
    #[serde(default)]
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Set once the turn failed. Terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_steps: Vec<ExecutionStep>,
}

impl Turn {
    /// Create a turn for a prompt with no answer yet
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Drop everything but the prompt
    pub fn clear_answer(&mut self) {
        *self = Turn::new(std::mem::take(&mut self.prompt));
    }

    /// The form in which this turn is sent back as history
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            prompt: self.prompt.clone(),
            response: self.response.clone(),
            tool_calls: self.tool_calls.clone(),
        }
    }
}

/// Which turn a delta or resubmission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The last turn, looked up again every time it is resolved
    Last,
    /// A fixed position
    Index(usize),
}

/// Conversation state owned by one pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<Turn>,
    pub status: Status,
    /// Server-side id, once the service has assigned one
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Every workflow node seen during the current request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_steps: Vec<ExecutionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_node_id: Option<String>,
}

impl Conversation {
    /// Append a fresh turn and return its index
    pub fn append_turn(&mut self, prompt: impl Into<String>) -> usize {
        self.turns.push(Turn::new(prompt));
        self.turns.len() - 1
    }

    /// Drop `turns[index..]` and append `turn` in its place, as one change.
    ///
    /// Turns before `index` are left where they are.
    pub fn replace_from(&mut self, index: usize, turn: Turn) -> usize {
        self.turns.truncate(index);
        self.turns.push(turn);
        self.turns.len() - 1
    }

    /// Clear a turn's answer ahead of a retry. Returns false if there is no such turn.
    pub fn reset_answer(&mut self, index: usize) -> bool {
        match self.turns.get_mut(index) {
            Some(turn) => {
                turn.clear_answer();
                true
            }
            None => false,
        }
    }

    /// Resolve a target against the current turn list
    pub fn resolve_target(&self, target: Target) -> Option<usize> {
        match target {
            Target::Last => self.turns.len().checked_sub(1),
            Target::Index(index) => (index < self.turns.len()).then_some(index),
        }
    }

    pub fn turn(&self, target: Target) -> Option<&Turn> {
        self.resolve_target(target).map(|i| &self.turns[i])
    }

    pub fn turn_mut(&mut self, target: Target) -> Option<&mut Turn> {
        self.resolve_target(target).map(|i| &mut self.turns[i])
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// History sent with a request for the turn at `index`.
    ///
    /// Failed turns are left out since their answers are incomplete.
    pub fn history_before(&self, index: usize) -> Vec<HistoryEntry> {
        self.turns
            .iter()
            .take(index)
            .filter(|turn| !turn.is_failed())
            .map(Turn::history_entry)
            .collect()
    }

    /// Mark the pipeline failed and attach `message` to the target turn
    pub fn set_error(&mut self, target: Target, message: impl Into<String>) {
        self.status = Status::Failed;
        if let Some(turn) = self.turn_mut(target) {
            turn.error = Some(message.into());
        }
    }

    /// Forget workflow progress from an earlier request
    pub fn clear_execution(&mut self) {
        self.execution_steps.clear();
        self.active_node_id = None;
    }

    /// Start a new chat
    pub fn reset(&mut self) {
        *self = Conversation::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(prompts: &[&str]) -> Conversation {
        let mut conv = Conversation::default();
        for prompt in prompts {
            conv.append_turn(*prompt);
        }
        conv
    }

    #[test]
    fn test_append_returns_index() {
        let mut conv = Conversation::default();
        assert_eq!(conv.append_turn("a"), 0);
        assert_eq!(conv.append_turn("b"), 1);
        assert_eq!(conv.turns[1].prompt, "b");
    }

    #[test]
    fn test_replace_from_truncates_later_turns() {
        let mut conv = conversation(&["a", "b", "c", "d"]);
        conv.turns[0].response = "first".into();
        let first_ptr: *const Turn = &conv.turns[0];

        let index = conv.replace_from(1, Turn::new("b2"));

        assert_eq!(index, 1);
        assert_eq!(conv.turns.len(), 2);
        assert_eq!(conv.turns[1].prompt, "b2");
        assert_eq!(conv.turns[0].response, "first");
        assert!(std::ptr::eq(first_ptr, &conv.turns[0]));
    }

    #[test]
    fn test_reset_answer_keeps_prompt() {
        let mut conv = conversation(&["a"]);
        conv.turns[0].response = "partial".into();
        conv.turns[0].error = Some("boom".into());
        conv.turns[0].tool_calls = Some(vec![ToolCall::new("c1")]);

        assert!(conv.reset_answer(0));
        assert_eq!(conv.turns[0], Turn::new("a"));
        assert!(!conv.reset_answer(3));
    }

    #[test]
    fn test_resolve_target_reads_current_length() {
        let mut conv = Conversation::default();
        assert_eq!(conv.resolve_target(Target::Last), None);
        conv.append_turn("a");
        assert_eq!(conv.resolve_target(Target::Last), Some(0));
        conv.append_turn("b");
        assert_eq!(conv.resolve_target(Target::Last), Some(1));
        assert_eq!(conv.resolve_target(Target::Index(1)), Some(1));
        assert_eq!(conv.resolve_target(Target::Index(2)), None);
    }

    #[test]
    fn test_history_skips_failed_turns() {
        let mut conv = conversation(&["a", "b", "c"]);
        conv.turns[0].response = "ra".into();
        conv.turns[1].error = Some("boom".into());

        let history = conv.history_before(2);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prompt, "a");
        assert_eq!(history[0].response, "ra");
    }

    #[test]
    fn test_set_error_marks_failed() {
        let mut conv = conversation(&["a"]);
        conv.status = Status::Loading;
        conv.set_error(Target::Last, "boom");
        assert_eq!(conv.status, Status::Failed);
        assert_eq!(conv.turns[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Loading).unwrap(), r#""loading""#);
    }
}
