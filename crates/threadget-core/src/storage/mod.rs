//! Disk I/O and file lifecycle.
//!
//! Every fetch attempt writes into `<target>.part` next to the final file,
//! preallocated when the size is known, and publishes it with one atomic
//! rename. A writer that is dropped without being finalized deletes its temp
//! file, so failed or cancelled attempts leave nothing behind.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.jpg` → `a.jpg.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Writes `data` to `final_path` through a temp file and rename.
pub fn write_atomic(final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut writer = StorageWriterBuilder::create(&temp_path(final_path))?.build();
    writer.append(data)?;
    writer.finalize(final_path)
}
