//! Slash commands for interactive mode

mod resubmit;
mod turns;

pub use resubmit::ResubmitCommand;
pub use turns::TurnsCommand;

use quill_chat::Conversation;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Start a new chat
    NewChat,
    /// Re-issue the request for a turn
    Retry(usize),
    /// Replace a turn's prompt and drop every later turn
    Edit { index: usize, prompt: String },
    /// Show a message to the user (not sent to the service)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, conversation: &Conversation) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" | "clear" => CommandResult::NewChat,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "retry" | "r" => ResubmitCommand::retry(args, conversation),

        "edit" | "e" => ResubmitCommand::edit(args, conversation),

        "turns" | "t" => CommandResult::Message(TurnsCommand::list(conversation)),

        "dump" | "d" => CommandResult::Message(TurnsCommand::dump(conversation)),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?          Show this help message
  /new, /n               Start a new chat
  /retry, /r [index]     Retry a turn (the last one by default)
  /edit, /e <i> <text>   Replace turn i with a new prompt, dropping later turns
  /turns, /t             List turns in this chat
  /dump, /d              Print the conversation as JSON
  /quit, /exit, /q       Exit quill

Press Ctrl-C while an answer streams to stop it.

Examples:
  /retry                 Retry the last answer
  /edit 0 What is a vector store?
                         Ask the first question again, differently"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(execute_command("hello", &Conversation::default()), None);
    }

    #[test]
    fn test_command_aliases() {
        let conv = Conversation::default();
        assert_eq!(execute_command("/q", &conv), Some(CommandResult::Exit));
        assert_eq!(execute_command(" /NEW ", &conv), Some(CommandResult::NewChat));
        assert_eq!(
            execute_command("/frobnicate now", &conv),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
    }
}
