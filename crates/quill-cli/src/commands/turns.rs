//! /turns and /dump commands

use quill_chat::{Conversation, Status};

use crate::utils::one_line;

pub struct TurnsCommand;

impl TurnsCommand {
    /// One line per turn with its prompt and answer state
    pub fn list(conversation: &Conversation) -> String {
        if conversation.turns.is_empty() {
            return "No turns yet.".to_string();
        }

        let mut output = String::new();
        for (i, turn) in conversation.turns.iter().enumerate() {
            let state = if turn.is_failed() {
                "failed".to_string()
            } else if turn.response.is_empty() {
                "no answer".to_string()
            } else {
                one_line(&turn.response, 40)
            };
            output.push_str(&format!(
                "  {}: {}  -> {}\n",
                i,
                one_line(&turn.prompt, 50),
                state
            ));
        }

        let status = match conversation.status {
            Status::Idle => "idle",
            Status::Loading => "loading",
            Status::Failed => "failed",
        };
        output.push_str(&format!("Status: {}", status));
        if let Some(ref id) = conversation.conversation_id {
            output.push_str(&format!(" | Conversation: {}", id));
        }
        output
    }

    /// The whole conversation as pretty JSON
    pub fn dump(conversation: &Conversation) -> String {
        serde_json::to_string_pretty(conversation)
            .unwrap_or_else(|e| format!("Failed to serialize conversation: {}", e))
    }
}
