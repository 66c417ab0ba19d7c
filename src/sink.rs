//! Append-only JSON-lines persistence for discovered items.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flixscout_search::{ResultItem, ResultSink, SearchError};

use crate::error::Result;

/// [`ResultSink`] writing one JSON object per item to a file.
///
/// Batches are written under a lock, so lines from concurrent fast-phase
/// workers never interleave.
#[derive(Debug)]
pub struct JsonlResultSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlResultSink {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonlResultSink {
    fn persist(&self, items: &[ResultItem], source_id: &str) -> std::result::Result<(), SearchError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for item in items {
            serde_json::to_writer(&mut buffer, item)
                .map_err(|e| SearchError::Sink(format!("failed to encode item: {e}")))?;
            buffer.push(b'\n');
        }

        let mut file = self.file.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("result sink lock poisoned; recovering");
            poisoned.into_inner()
        });
        file.write_all(&buffer).map_err(|e| {
            SearchError::Sink(format!("failed to write {}: {e}", self.path.display()))
        })?;

        tracing::debug!(source = source_id, count = items.len(), "persisted items");
        Ok(())
    }
}
