//! `ag`: named, file-backed chat sessions for a chat-completion service.
//!
//! Sessions live as markdown files with version history; `ask` sends a
//! session (or stdin) as a one-shot prompt and `chat` runs an interactive
//! loop that can be saved as a new session when it ends.

pub mod app;
pub mod ask;
pub mod cli;
pub mod collaborators;
pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;
pub mod terminal;
