use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chat '{name}' doesn't exist")]
    SessionNotFound { name: String },

    #[error("Chat '{name}' already exists")]
    SessionExists { name: String },

    #[error("Prompt '{name}' not found")]
    InstructionNotFound { name: String },

    #[error("Prompt '{name}' already exists")]
    InstructionExists { name: String },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// True for the "named entity is absent" family.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. } | Self::InstructionNotFound { .. }
        )
    }

    /// True for the "name already taken" family.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::SessionExists { .. } | Self::InstructionExists { .. }
        )
    }
}
