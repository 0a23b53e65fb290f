//! One-shot question against a session, stdin, or a scratch copy.
//!
//! Every call ends in exactly one [`AskOutcome`]: the reply is appended to
//! the session it came from, saved into a brand-new session, or discarded.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chat_provider::{prompt_messages, CompletionError, CompletionProvider, ResponseMode};
use session_store::{
    render_assistant_section, render_scratch, CommitStatus, InstructionStore, SessionStore,
    StoreError,
};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Where the system prompt comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstructionChoice {
    /// The default instruction, if one is set.
    #[default]
    Default,
    Named(String),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AskRequest {
    /// Session to read the prompt from, or to append a stdin exchange to.
    pub session: Option<String>,
    /// Prompt text read from stdin; takes precedence over the session file.
    pub stdin_prompt: Option<String>,
    /// Work on a temporary copy and leave stored sessions untouched.
    pub temp: bool,
    /// Persist a scratch exchange into this new session.
    pub save_as: Option<String>,
    pub mode: ResponseMode,
    pub instruction: InstructionChoice,
}

/// Resolved prompt text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Stdin {
        text: String,
        target: Option<String>,
    },
    Session {
        name: String,
        text: String,
    },
}

impl PromptSource {
    pub fn text(&self) -> &str {
        match self {
            Self::Stdin { text, .. } | Self::Session { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    Discarded,
    SavedAs { name: String, commit: CommitStatus },
    Appended { name: String, commit: CommitStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskReport {
    pub reply: String,
    pub outcome: AskOutcome,
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Require a session name, a default session, or --stdin")]
    NoPromptSource,

    #[error("--save-as only applies to --temp runs or to a --stdin prompt without a session")]
    SaveAsWithoutScratch,

    #[error("scratch session: {operation} failed: {source}")]
    Scratch {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Temporary markdown copy of a prompt, removed when dropped.
#[derive(Debug)]
pub struct ScratchSession {
    file: NamedTempFile,
}

impl ScratchSession {
    pub fn create(prompt: &str) -> Result<Self, AskError> {
        let mut file = tempfile::Builder::new()
            .prefix("ag-")
            .suffix(".md")
            .tempfile()
            .map_err(|source| AskError::Scratch {
                operation: "creating file",
                source,
            })?;
        file.write_all(render_scratch(prompt).as_bytes())
            .map_err(|source| AskError::Scratch {
                operation: "writing prompt",
                source,
            })?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn append_reply(&self, reply: &str) -> Result<(), AskError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path())
            .map_err(|source| AskError::Scratch {
                operation: "opening file",
                source,
            })?;
        file.write_all(render_assistant_section(reply).as_bytes())
            .map_err(|source| AskError::Scratch {
                operation: "appending reply",
                source,
            })
    }
}

/// Named instruction, else raw text, else the default instruction.
///
/// A stale default pointer is reported as `InstructionNotFound`; blank text
/// counts as no instruction.
pub fn resolve_instruction(
    store: &InstructionStore,
    choice: &InstructionChoice,
) -> Result<Option<String>, StoreError> {
    let text = match choice {
        InstructionChoice::Named(name) => Some(store.read(name)?),
        InstructionChoice::Text(text) => Some(text.clone()),
        InstructionChoice::Default => match store.default_instruction()? {
            Some(name) => Some(store.read(&name)?),
            None => None,
        },
    };
    Ok(text.filter(|text| !text.trim().is_empty()))
}

pub struct Asker<'a> {
    sessions: &'a SessionStore,
    instructions: &'a InstructionStore,
    provider: &'a dyn CompletionProvider,
    timeout: Duration,
}

impl<'a> Asker<'a> {
    pub fn new(
        sessions: &'a SessionStore,
        instructions: &'a InstructionStore,
        provider: &'a dyn CompletionProvider,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            instructions,
            provider,
            timeout,
        }
    }

    pub fn resolve_instruction(
        &self,
        choice: &InstructionChoice,
    ) -> Result<Option<String>, AskError> {
        Ok(resolve_instruction(self.instructions, choice)?)
    }

    pub fn resolve_prompt(&self, request: &AskRequest) -> Result<PromptSource, AskError> {
        if let Some(text) = &request.stdin_prompt {
            let target = match request.session.as_deref() {
                Some(name) => self.sessions.resolve(Some(name))?,
                None => None,
            };
            return Ok(PromptSource::Stdin {
                text: text.trim().to_string(),
                target,
            });
        }

        match self.sessions.resolve(request.session.as_deref())? {
            Some(name) => {
                let text = self.sessions.read_full(&name)?;
                Ok(PromptSource::Session { name, text })
            }
            None => Err(AskError::NoPromptSource),
        }
    }

    /// Sends the prompt and applies exactly one outcome. `emit` receives
    /// streamed fragments as they arrive.
    pub fn ask(
        &self,
        request: &AskRequest,
        emit: &mut dyn FnMut(&str),
    ) -> Result<AskReport, AskError> {
        let instruction = self.resolve_instruction(&request.instruction)?;
        let source = self.resolve_prompt(request)?;
        if let Some(name) = &request.save_as {
            if !request.temp && !matches!(source, PromptSource::Stdin { target: None, .. }) {
                return Err(AskError::SaveAsWithoutScratch);
            }
            if self.sessions.exists(name)? {
                return Err(StoreError::SessionExists { name: name.clone() }.into());
            }
        }

        let scratch = if request.temp {
            Some(ScratchSession::create(source.text())?)
        } else {
            None
        };

        let messages = prompt_messages(instruction.as_deref(), source.text());
        tracing::debug!(
            messages = messages.len(),
            temp = request.temp,
            streaming = request.mode.is_streaming(),
            "asking"
        );
        let reply = self
            .provider
            .complete(&messages, request.mode, self.timeout, emit)?;

        let outcome = match (scratch, &source) {
            (Some(scratch), _) => {
                scratch.append_reply(&reply)?;
                self.save_or_discard(request, instruction.as_deref(), source.text(), &reply)?
            }
            (None, PromptSource::Session { name, .. }) => AskOutcome::Appended {
                name: name.clone(),
                commit: self.sessions.append_reply(name, &reply)?,
            },
            (None, PromptSource::Stdin { text, target: Some(name) }) => AskOutcome::Appended {
                name: name.clone(),
                commit: self.sessions.append_exchange(name, text, &reply)?,
            },
            (None, PromptSource::Stdin { text, target: None }) => {
                self.save_or_discard(request, instruction.as_deref(), text, &reply)?
            }
        };

        Ok(AskReport { reply, outcome })
    }

    fn save_or_discard(
        &self,
        request: &AskRequest,
        instruction: Option<&str>,
        prompt: &str,
        reply: &str,
    ) -> Result<AskOutcome, AskError> {
        let Some(name) = &request.save_as else {
            return Ok(AskOutcome::Discarded);
        };

        let created = self.sessions.create(name, instruction)?;
        let appended = self.sessions.append_exchange(name, prompt, reply)?;
        Ok(AskOutcome::SavedAs {
            name: name.clone(),
            commit: worst(created, appended),
        })
    }
}

fn worst(first: CommitStatus, second: CommitStatus) -> CommitStatus {
    match (first, second) {
        (_, warning @ CommitStatus::Warning(_)) => warning,
        (warning @ CommitStatus::Warning(_), CommitStatus::Committed) => warning,
        (CommitStatus::Committed, CommitStatus::Committed) => CommitStatus::Committed,
    }
}
