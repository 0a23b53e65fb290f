use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::paths::{
    ensure_dir, entry_file_name, instruction_pointer_path, instruction_root, list_entries,
    validate_name,
};
use crate::pointer::DefaultPointer;

/// Named system-prompt files plus the default-instruction pointer.
#[derive(Debug, Clone)]
pub struct InstructionStore {
    root: PathBuf,
    pointer: DefaultPointer,
}

impl InstructionStore {
    /// Store rooted at `<home>/insn`, pointer at `<home>/insn/current`.
    #[must_use]
    pub fn open(home: &Path) -> Self {
        Self::new(instruction_root(home), instruction_pointer_path(home))
    }

    #[must_use]
    pub fn new(root: impl Into<PathBuf>, pointer_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pointer: DefaultPointer::new(pointer_path),
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

    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        list_entries(&self.root)
    }

    pub fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.existing_path(name)?;
        fs::read_to_string(&path)
            .map_err(|source| StoreError::io("reading instruction file", &path, source))
    }

    /// Creates `name` empty, or seeded with the content of `source_file`.
    pub fn create(&self, name: &str, source_file: Option<&Path>) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        if path.exists() {
            return Err(StoreError::InstructionExists {
                name: name.to_string(),
            });
        }

        let text = match source_file {
            Some(source_path) => fs::read_to_string(source_path).map_err(|source| {
                StoreError::io("reading instruction source", source_path, source)
            })?,
            None => String::new(),
        };

        ensure_dir(&self.root)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => StoreError::InstructionExists {
                    name: name.to_string(),
                },
                _ => StoreError::io("creating instruction file", &path, source),
            })?;
        file.write_all(text.as_bytes())
            .map_err(|source| StoreError::io("writing instruction file", &path, source))
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.existing_path(name)?;
        fs::remove_file(&path)
            .map_err(|source| StoreError::io("deleting instruction file", &path, source))
    }

    pub fn set_default(&self, name: &str) -> Result<(), StoreError> {
        if !self.list()?.iter().any(|known| known == name) {
            return Err(StoreError::InstructionNotFound {
                name: name.to_string(),
            });
        }
        self.pointer.write(name)
    }

    /// Stored default name; unset is `None`, never an error.
    pub fn default_instruction(&self) -> Result<Option<String>, StoreError> {
        self.pointer.read()
    }

    fn existing_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(name)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::InstructionNotFound {
                name: name.to_string(),
            })
        }
    }
}
