//! /retry and /edit commands

use super::CommandResult;
use quill_chat::Conversation;

pub struct ResubmitCommand;

impl ResubmitCommand {
    /// `/retry [index]`, defaulting to the last turn
    pub fn retry(args: &str, conversation: &Conversation) -> CommandResult {
        let len = conversation.turns.len();
        if len == 0 {
            return CommandResult::Message("No turns to retry.".to_string());
        }
        if args.is_empty() {
            return CommandResult::Retry(len - 1);
        }
        match parse_index(args, len) {
            Ok(index) => CommandResult::Retry(index),
            Err(msg) => CommandResult::Message(msg),
        }
    }

    /// `/edit <index> <prompt>`
    pub fn edit(args: &str, conversation: &Conversation) -> CommandResult {
        let usage = || CommandResult::Message("Usage: /edit <index> <new prompt>".to_string());

        let Some((index, prompt)) = args.split_once(' ') else {
            return usage();
        };
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return usage();
        }
        match parse_index(index, conversation.turns.len()) {
            Ok(index) => CommandResult::Edit {
                index,
                prompt: prompt.to_string(),
            },
            Err(msg) => CommandResult::Message(msg),
        }
    }
}

fn parse_index(arg: &str, len: usize) -> Result<usize, String> {
    let index: usize = arg
        .trim()
        .parse()
        .map_err(|_| format!("Not a turn index: {}", arg.trim()))?;
    if index >= len {
        return Err(format!(
            "No turn {} (this chat has {} turn{})",
            index,
            len,
            if len == 1 { "" } else { "s" }
        ));
    }
    Ok(index)
}
