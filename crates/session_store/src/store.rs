use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::paths::{
    ensure_dir, entry_file_name, list_entries, session_pointer_path, session_root, validate_name,
};
use crate::pointer::DefaultPointer;
use crate::schema::{render_assistant_section, render_exchange, render_template, Exchange};
use crate::vcs::{commit_message, CommitStatus, VersionControl};

/// Named markdown conversation files plus the default-session pointer.
///
/// Every successful mutation is followed by one commit over the whole
/// directory; a failed commit is reported as [`CommitStatus::Warning`].
pub struct SessionStore {
    root: PathBuf,
    pointer: DefaultPointer,
    vcs: Arc<dyn VersionControl>,
}

impl SessionStore {
    /// Store rooted at `<home>/chats` with its pointer at `<home>/current`.
    #[must_use]
    pub fn open(home: &Path, vcs: Arc<dyn VersionControl>) -> Self {
        Self::new(session_root(home), session_pointer_path(home), vcs)
    }

    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        pointer_path: impl Into<PathBuf>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            root: root.into(),
            pointer: DefaultPointer::new(pointer_path),
            vcs,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(entry_file_name(name)))
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(name)?.is_file())
    }

    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        list_entries(&self.root)
    }

    pub fn create(&self, name: &str, instructions: Option<&str>) -> Result<CommitStatus, StoreError> {
        let path = self.path_for(name)?;
        ensure_dir(&self.root)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => StoreError::SessionExists {
                    name: name.to_string(),
                },
                _ => StoreError::io("creating session file", &path, source),
            })?;
        file.write_all(render_template(name, instructions).as_bytes())
            .map_err(|source| StoreError::io("writing session template", &path, source))?;

        tracing::debug!(session = name, "session created");
        Ok(self.commit(name))
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<CommitStatus, StoreError> {
        let old_path = self.existing_path(old)?;
        let new_path = self.path_for(new)?;
        if new_path.exists() {
            return Err(StoreError::SessionExists {
                name: new.to_string(),
            });
        }

        fs::rename(&old_path, &new_path)
            .map_err(|source| StoreError::io("renaming session file", &old_path, source))?;

        tracing::debug!(from = old, to = new, "session renamed");
        Ok(self.commit(new))
    }

    pub fn delete(&self, name: &str) -> Result<CommitStatus, StoreError> {
        let path = self.existing_path(name)?;
        fs::remove_file(&path)
            .map_err(|source| StoreError::io("deleting session file", &path, source))?;

        tracing::debug!(session = name, "session deleted");
        Ok(self.commit(name))
    }

    /// Entire session file, sent upstream verbatim as a multi-turn prompt.
    pub fn read_full(&self, name: &str) -> Result<String, StoreError> {
        let path = self.existing_path(name)?;
        fs::read_to_string(&path)
            .map_err(|source| StoreError::io("reading session file", &path, source))
    }

    /// Raw file content for display.
    pub fn show(&self, name: &str) -> Result<String, StoreError> {
        self.read_full(name)
    }

    pub fn append_reply(&self, name: &str, reply: &str) -> Result<CommitStatus, StoreError> {
        self.append(name, &render_assistant_section(reply))
    }

    pub fn append_exchange(
        &self,
        name: &str,
        user: &str,
        reply: &str,
    ) -> Result<CommitStatus, StoreError> {
        self.append_exchanges(name, &[Exchange::new(user, reply)])
    }

    /// Writes every exchange in order with one append and one commit.
    pub fn append_exchanges(
        &self,
        name: &str,
        exchanges: &[Exchange],
    ) -> Result<CommitStatus, StoreError> {
        let mut buffer = String::new();
        for exchange in exchanges {
            buffer.push_str(&render_exchange(exchange));
        }
        self.append(name, &buffer)
    }

    /// Stored default name, possibly naming a session that no longer exists.
    pub fn default_session(&self) -> Result<Option<String>, StoreError> {
        self.pointer.read()
    }

    pub fn set_default(&self, name: &str) -> Result<(), StoreError> {
        self.existing_path(name)?;
        self.pointer.write(name)
    }

    /// Explicit name, else the default pointer; the result must exist.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<Option<String>, StoreError> {
        let name = match explicit {
            Some(name) => Some(name.to_string()),
            None => self.default_session()?,
        };

        let Some(name) = name else {
            return Ok(None);
        };

        if explicit.is_none() && !self.exists(&name)? {
            tracing::warn!(session = %name, "default session pointer is stale");
        }
        self.existing_path(&name)?;
        Ok(Some(name))
    }

    fn existing_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(name)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::SessionNotFound {
                name: name.to_string(),
            })
        }
    }

    fn append(&self, name: &str, text: &str) -> Result<CommitStatus, StoreError> {
        let path = self.existing_path(name)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => StoreError::SessionNotFound {
                    name: name.to_string(),
                },
                _ => StoreError::io("opening session file for append", &path, source),
            })?;
        file.write_all(text.as_bytes())
            .map_err(|source| StoreError::io("appending to session file", &path, source))?;

        tracing::debug!(session = name, bytes = text.len(), "session appended");
        Ok(self.commit(name))
    }

    fn commit(&self, name: &str) -> CommitStatus {
        let message = commit_message(name);
        match self.vcs.commit(&self.root, &message) {
            Ok(()) => CommitStatus::Committed,
            Err(error) => {
                tracing::debug!(session = name, %error, "version history commit failed");
                CommitStatus::Warning(error)
            }
        }
    }
}
