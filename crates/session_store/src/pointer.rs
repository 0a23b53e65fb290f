use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Single persisted name marking the "current" entry of a store.
///
/// The pointer is never cleared when its target disappears; callers re-check
/// existence before using the value.
#[derive(Debug, Clone)]
pub struct DefaultPointer {
    path: PathBuf,
}

impl DefaultPointer {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored name, or `None` when nothing has been set.
    pub fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let name = raw.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::io("reading default pointer", &self.path, source)),
        }
    }

    pub fn write(&self, name: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        fs::write(&self.path, name)
            .map_err(|source| StoreError::io("writing default pointer", &self.path, source))
    }
}
