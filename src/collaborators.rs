//! External editor and fuzzy-selector programs.
//!
//! Both are narrow traits so commands can run against in-memory fakes. A
//! non-zero exit, a missing program, or an empty choice is a cancellation,
//! never an error.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Saved,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(String),
    Cancelled,
}

pub trait Editor {
    fn edit(&self, path: &Path) -> EditOutcome;
}

pub trait Selector {
    /// Lets the user pick one of `options`, which is never empty.
    fn select(&self, prompt: &str, options: &[String]) -> Selection;
}

/// Runs `$EDITOR <path>` and waits for it.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    program: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Splits a command line such as `code --wait` into program and args.
    pub fn from_command_line(command_line: &str) -> Self {
        let (program, args) = split_command_line(command_line);
        Self { program, args }
    }
}

impl Editor for ExternalEditor {
    fn edit(&self, path: &Path) -> EditOutcome {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status();
        match status {
            Ok(status) if status.success() => EditOutcome::Saved,
            Ok(status) => {
                tracing::debug!(program = %self.program, %status, "editor exited unsuccessfully");
                EditOutcome::Cancelled
            }
            Err(error) => {
                tracing::debug!(program = %self.program, %error, "editor could not be started");
                EditOutcome::Cancelled
            }
        }
    }
}

/// Pipes newline-separated options into a selector such as `fzf` and reads
/// the chosen line from its stdout.
#[derive(Debug, Clone)]
pub struct ExternalSelector {
    program: String,
    args: Vec<String>,
}

impl ExternalSelector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn from_command_line(command_line: &str) -> Self {
        let (program, args) = split_command_line(command_line);
        Self { program, args }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn run(&self, prompt: &str, options: &[String]) -> std::io::Result<Option<String>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--prompt={prompt}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(options.join("\n").as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            tracing::debug!(program = %self.program, status = %output.status, "selector exited unsuccessfully");
            return Ok(None);
        }

        let choice = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!choice.is_empty()).then_some(choice))
    }
}

impl Selector for ExternalSelector {
    fn select(&self, prompt: &str, options: &[String]) -> Selection {
        match self.run(prompt, options) {
            Ok(Some(choice)) => Selection::Chosen(choice),
            Ok(None) => Selection::Cancelled,
            Err(error) => {
                tracing::debug!(program = %self.program, %error, "selector could not be run");
                Selection::Cancelled
            }
        }
    }
}

fn split_command_line(command_line: &str) -> (String, Vec<String>) {
    let mut parts = command_line.split_whitespace().map(ToOwned::to_owned);
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}
