//! [`FileLogExporter`]: appends JSON lines to a local file.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use common::LogRecord;

use super::{ExportError, LogExporter};
use crate::format::render_json;

/// Appends one JSON object per record to a file.
///
/// The file is opened lazily on first export and reopened after a write
/// failure, so a path that becomes writable later starts receiving records
/// without a restart. Records always use the JSON layout, whatever
/// `LOG_FORMAT` selects for the console.
#[derive(Debug)]
pub struct FileLogExporter {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileLogExporter {
    /// Create an exporter for `path`. Nothing is opened yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ExportError {
        ExportError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn open(&self) -> Result<File, ExportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        // A panic while holding the lock leaves the handle usable.
        self.file.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogExporter for FileLogExporter {
    fn name(&self) -> &'static str {
        "file"
    }

    fn export(&self, record: &LogRecord) -> Result<(), ExportError> {
        let line = render_json(record);
        let mut slot = self.lock();

        if slot.is_none() {
            *slot = Some(self.open()?);
        }
        let Some(file) = slot.as_mut() else {
            return Ok(());
        };

        if let Err(e) = file.write_all(line.as_bytes()) {
            *slot = None;
            return Err(self.io_error(e));
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        match self.lock().as_mut() {
            Some(file) => file.flush().map_err(|e| self.io_error(e)),
            None => Ok(()),
        }
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        let mut slot = self.lock();
        let result = match slot.as_mut() {
            Some(file) => file.flush().map_err(|e| self.io_error(e)),
            None => Ok(()),
        };
        *slot = None;
        result
    }
}
