/// Slash commands understood by the REPL. Any other line, including unknown
/// slash-prefixed text, is sent to the model as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
}

pub const HELP_TEXT: &str = "Commands: /help, /exit, /quit (Ctrl-D also ends the chat)";

pub fn parse_repl_command(input: &str) -> Option<ReplCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed.split_whitespace().next().unwrap_or(trimmed);
    match command {
        "/help" => Some(ReplCommand::Help),
        "/exit" | "/quit" => Some(ReplCommand::Exit),
        _ => None,
    }
}
