//! Version history over the session directory.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use time::macros::format_description;
use time::OffsetDateTime;

/// Outcome of the commit step that follows a session mutation.
///
/// A failed commit never undoes the file change that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    Committed,
    Warning(String),
}

impl CommitStatus {
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Committed => None,
            Self::Warning(message) => Some(message),
        }
    }
}

/// Narrow collaborator that records a snapshot of `root`.
pub trait VersionControl: Send + Sync {
    fn commit(&self, root: &Path, message: &str) -> Result<(), String>;
}

/// Commits through the `git` executable, initializing the repository lazily.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn ensure_repo(&self, root: &Path) -> Result<(), String> {
        if root.join(".git").exists() {
            return Ok(());
        }

        tracing::debug!(root = %root.display(), "initializing version history");
        self.run("git init", |command| {
            command.arg("init").arg(root);
        })
    }

    fn run(&self, label: &str, configure: impl FnOnce(&mut Command)) -> Result<(), String> {
        let mut command = Command::new(&self.program);
        configure(&mut command);
        let status = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| format!("{label} could not start: {error}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("{label} exited with {status}"))
        }
    }
}

impl VersionControl for GitCli {
    fn commit(&self, root: &Path, message: &str) -> Result<(), String> {
        self.ensure_repo(root)?;
        self.run("git add", |command| {
            command.arg("-C").arg(root).args(["add", "."]);
        })?;
        self.run("git commit", |command| {
            command
                .arg("-C")
                .arg(root)
                .args(["commit", "--quiet", "-m", message]);
        })
    }
}

/// Skips version history entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVersionControl;

impl VersionControl for NoVersionControl {
    fn commit(&self, _root: &Path, _message: &str) -> Result<(), String> {
        Ok(())
    }
}

/// In-memory recorder used by tests; can be told to fail every commit.
#[derive(Debug, Default)]
pub struct RecordingVersionControl {
    messages: Mutex<Vec<String>>,
    failure: Option<String>,
}

impl RecordingVersionControl {
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        lock_unpoisoned(&self.messages).clone()
    }
}

impl VersionControl for RecordingVersionControl {
    fn commit(&self, _root: &Path, message: &str) -> Result<(), String> {
        lock_unpoisoned(&self.messages).push(message.to_string());
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

/// `"<name>: Q&A @ YYYY-MM-DD HH:MM:SS"` in local time.
#[must_use]
pub fn commit_message(name: &str) -> String {
    format!("{name}: Q&A @ {}", local_timestamp())
}

pub(crate) fn local_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
