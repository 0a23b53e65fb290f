//! Line-editing terminal for the chat loop.

use std::io::{self, Write};

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::app::{NoticeLevel, ReadOutcome, ReplIo};

pub struct TerminalIo {
    editor: DefaultEditor,
}

impl TerminalIo {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    fn prompt_answer(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Some(line),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
            Err(error) => {
                tracing::debug!(%error, "reading answer failed");
                None
            }
        }
    }
}

impl ReplIo for TerminalIo {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                ReadOutcome::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(error) => {
                tracing::debug!(%error, "reading input failed");
                ReadOutcome::Eof
            }
        }
    }

    fn write_chunk(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn end_reply(&mut self) {
        println!();
    }

    fn notice(&mut self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => println!("{}", message.bright_black()),
            NoticeLevel::Success => println!("{}", message.green()),
            NoticeLevel::Warning => eprintln!("{}", message.yellow()),
            NoticeLevel::Error => eprintln!("{}", message.red()),
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        let Some(answer) = self.prompt_answer(&format!("{question} [Y/n] ")) else {
            return false;
        };
        !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
    }

    fn ask_name(&mut self, question: &str, suggestion: &str) -> Option<String> {
        self.prompt_answer(&format!("{question} [{suggestion}]: "))
    }
}
