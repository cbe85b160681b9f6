//! Builder for creating and preallocating temp download files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Builder for a new temp download file. Call `preallocate` (optional) then
/// `build` to get the `StorageWriter` the transfer appends to.
pub struct StorageWriterBuilder {
    file: File,
    temp_path: PathBuf,
}

impl StorageWriterBuilder {
    /// Create a new temp file at `temp_path` (e.g. `a.jpg.part`).
    /// Truncates anything left there by an earlier crashed run.
    pub fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(StorageWriterBuilder {
            file,
            temp_path: temp_path.to_path_buf(),
        })
    }

    /// Reserve `size` bytes up front so a full disk fails before the transfer
    /// starts. On Unix tries `posix_fallocate`; elsewhere, or when the
    /// filesystem does not support it, does nothing. `finalize` trims the file
    /// back to the bytes actually written.
    pub fn preallocate(&mut self, size: u64) -> io::Result<()> {
        if size == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == libc::ENOSPC {
                return Err(io::Error::from_raw_os_error(r));
            }
            if r != 0 {
                tracing::debug!(errno = r, "posix_fallocate unsupported, skipping preallocation");
            }
        }
        Ok(())
    }

    /// Finish building and return the writer.
    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file_and_path(self.file, self.temp_path)
    }
}
