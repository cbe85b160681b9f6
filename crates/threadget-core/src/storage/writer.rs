//! Sequential writer for temp download files.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writer for one temp download file. Owns the temp file until `finalize`
/// renames it into place; dropping it earlier deletes the temp file.
pub struct StorageWriter {
    file: Option<File>,
    temp_path: PathBuf,
    written: u64,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Some(file),
            temp_path,
            written: 0,
        }
    }

    /// Append `data` at the current end of the body.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already finalized"))?;
        file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Sync file data to disk. `finalize` does this itself.
    pub fn sync(&self) -> io::Result<()> {
        match &self.file {
            Some(f) => f.sync_all(),
            None => Ok(()),
        }
    }

    /// Trims the file to the bytes actually written (drops unused
    /// preallocation), syncs and closes it, then atomically renames it to
    /// `final_path`.
    /// This rename is the only point where a download becomes visible.
    pub fn finalize(mut self, final_path: &Path) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.set_len(self.written)?;
            file.sync_all()?;
            drop(file);
        }
        std::fs::rename(&self.temp_path, final_path)?;
        // Rename succeeded: nothing left for Drop to clean up.
        self.temp_path = PathBuf::new();
        Ok(())
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => tracing::debug!(path = %self.temp_path.display(), "removed temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.temp_path.display(),
                error = %e,
                "could not remove temp file"
            ),
        }
    }
}
