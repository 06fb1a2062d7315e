#![deny(missing_docs)]
//! JSON-lines implementation of the emptor `RecordSink` trait.
//!
//! Each appended [`LogRecord`] becomes one line of JSON carrying its `type`
//! discriminator, so stage events, token charges, messages, and full run
//! results interleave in causal order in a single replayable file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use emptor_types::{LogRecord, RecordSink, StoreError};

/// Append-only JSON-lines sink backed by a single file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating the file and any missing parent
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the path cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    /// The file this sink appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn append(&self, record: &LogRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{line}")?;
        Ok(())
    }
}
