use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

pub const SESSION_DIR: &str = "chats";
pub const SESSION_POINTER: &str = "current";
pub const INSTRUCTION_DIR: &str = "insn";
pub const INSTRUCTION_POINTER: &str = "current";
pub const ENTRY_EXTENSION: &str = "md";

#[must_use]
pub fn session_root(home: &Path) -> PathBuf {
    home.join(SESSION_DIR)
}

#[must_use]
pub fn session_pointer_path(home: &Path) -> PathBuf {
    home.join(SESSION_POINTER)
}

#[must_use]
pub fn instruction_root(home: &Path) -> PathBuf {
    home.join(INSTRUCTION_DIR)
}

#[must_use]
pub fn instruction_pointer_path(home: &Path) -> PathBuf {
    instruction_root(home).join(INSTRUCTION_POINTER)
}

#[must_use]
pub fn entry_file_name(name: &str) -> String {
    format!("{name}.{ENTRY_EXTENSION}")
}

/// Rejects names that would escape the store directory or hide the file.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let reason = if name.trim().is_empty() {
        Some("name must not be empty")
    } else if name != name.trim() {
        Some("name must not start or end with whitespace")
    } else if name.starts_with('.') {
        Some("name must not start with '.'")
    } else if name.contains(['/', '\\']) {
        Some("name must not contain path separators")
    } else if name.chars().any(char::is_control) {
        Some("name must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub(crate) fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::io("creating directory", path, source))
}

/// Names of every `<name>.md` file directly under `dir`, sorted.
pub(crate) fn list_entries(dir: &Path) -> Result<Vec<String>, StoreError> {
    ensure_dir(dir)?;
    let read_dir =
        fs::read_dir(dir).map_err(|source| StoreError::io("listing directory", dir, source))?;

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| StoreError::io("listing directory", dir, source))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.push(stem.to_string());
        }
    }

    names.sort();
    Ok(names)
}
