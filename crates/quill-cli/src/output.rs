//! Terminal rendering of a streaming turn

use quill_chat::{ExecutionStep, Turn};

use crate::utils::truncate_chars;

/// Prints only the part of a turn that has not been shown yet
pub struct AnswerPrinter {
    index: usize,
    shown_response: String,
    shown_thought: String,
}

/// New text to write after a turn update
#[derive(Debug, Default, PartialEq)]
pub struct Delta {
    /// Answer text, for stdout
    pub response: String,
    /// Reasoning text, for stderr
    pub thought: String,
}

impl AnswerPrinter {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            shown_response: String::new(),
            shown_thought: String::new(),
        }
    }

    /// Index of the turn being followed
    pub fn index(&self) -> usize {
        self.index
    }

    /// Text added since the last call.
    ///
    /// When the text no longer starts with what was already printed (a
    /// structured answer replaces the response outright), the whole new text
    /// is returned on a fresh line.
    pub fn delta(&mut self, turn: &Turn) -> Delta {
        Delta {
            response: unseen(&turn.response, &mut self.shown_response),
            thought: unseen(&turn.thought, &mut self.shown_thought),
        }
    }
}

fn unseen(text: &str, shown: &mut String) -> String {
    let fresh = match text.strip_prefix(shown.as_str()) {
        Some(rest) => rest.to_string(),
        None => format!("\n{}", text),
    };
    shown.clear();
    shown.push_str(text);
    fresh
}

/// Trailer printed after an answer: sources, tool calls and any error
pub fn summary(turn: &Turn) -> String {
    let mut lines = Vec::new();

    let sources = turn.sources.as_deref().unwrap_or_default();
    if !sources.is_empty() {
        lines.push("Sources:".to_string());
        for source in sources {
            let title = source
                .short_title()
                .or(source.source.as_deref())
                .unwrap_or("untitled");
            lines.push(format!("  - {}", title));
        }
    }

    if let Some(ref calls) = turn.tool_calls {
        for call in calls {
            let name = call
                .tool_name()
                .or(call.action_name())
                .unwrap_or(&call.call_id);
            let status = call.status().unwrap_or("unknown");
            lines.push(format!("[tool {}: {}]", name, status));
        }
    }

    if let Some(ref structured) = turn.structured {
        lines.push(format!(
            "Structured: {}",
            truncate_chars(&structured.to_string(), 200)
        ));
    }

    if let Some(ref error) = turn.error {
        lines.push(format!("Error: {}", error));
    }

    lines.join("\n")
}

/// One progress line for a workflow node
pub fn step_line(step: &ExecutionStep) -> String {
    let name = if step.node_title.is_empty() {
        &step.node_id
    } else {
        &step.node_title
    };
    let status: String = step.status.clone().into();
    match step.error {
        Some(ref error) => format!("[{} {}: {}]", name, status, error),
        None => format!("[{} {}]", name, status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_wire::{Source, StepStatus, ToolCall};

    #[test]
    fn test_delta_prints_only_new_text() {
        let mut printer = AnswerPrinter::new(0);
        let mut turn = Turn::new("q");

        turn.response = "Hel".into();
        assert_eq!(printer.delta(&turn).response, "Hel");
        turn.response = "Hello".into();
        turn.thought = "hm".into();
        let delta = printer.delta(&turn);
        assert_eq!(delta.response, "lo");
        assert_eq!(delta.thought, "hm");
        assert_eq!(printer.delta(&turn), Delta::default());
    }

    #[test]
    fn test_replaced_response_is_reprinted() {
        let mut printer = AnswerPrinter::new(0);
        let mut turn = Turn::new("q");
        turn.response = "a long draft".into();
        printer.delta(&turn);

        turn.response = "final".into();
        assert_eq!(printer.delta(&turn).response, "\nfinal");
    }

    #[test]
    fn test_longer_replacement_is_reprinted() {
        let mut printer = AnswerPrinter::new(0);
        let mut turn = Turn::new("q");
        turn.response = "draft".into();
        printer.delta(&turn);

        turn.response = "final answer".into();
        assert_eq!(printer.delta(&turn).response, "\nfinal answer");
        turn.response = "final answer.".into();
        assert_eq!(printer.delta(&turn).response, ".");
    }

    #[test]
    fn test_summary_lists_sources_tools_and_error() {
        let mut turn = Turn::new("q");
        turn.sources = Some(vec![Source {
            title: Some("docs/guide/setup.md".into()),
            ..Default::default()
        }]);
        turn.tool_calls = Some(vec![
            ToolCall::new("c1")
                .with_field("tool_name", "search")
                .with_field("status", "completed"),
        ]);
        turn.error = Some("boom".into());

        let text = summary(&turn);
        assert!(text.contains("  - setup.md"));
        assert!(text.contains("[tool search: completed]"));
        assert!(text.ends_with("Error: boom"));
    }

    #[test]
    fn test_step_line_falls_back_to_node_id() {
        let step = ExecutionStep {
            node_id: "n1".into(),
            node_type: "agent".into(),
            node_title: String::new(),
            status: StepStatus::Running,
            reasoning: None,
            state_snapshot: None,
            output: None,
            error: None,
            started_at: 0,
            completed_at: None,
        };
        assert_eq!(step_line(&step), "[n1 running]");
    }
}
