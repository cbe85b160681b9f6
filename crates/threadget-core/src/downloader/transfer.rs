//! One fetch attempt: streaming GET into `<target>.part`, verify, rename.

use std::path::Path;

use super::{new_easy, validate_url, HttpOptions};
use crate::control::CancelToken;
use crate::descriptor::Descriptor;
use crate::retry::FetchError;
use crate::storage::{self, StorageWriterBuilder};

/// Downloads `descriptor` into `target_dir` with a single GET.
///
/// The body goes to `<target_name>.part`; only after a 2xx status and, when
/// the size is known, a matching length, is it renamed to `target_name`. Every
/// other exit drops the writer, which deletes the temp file. `on_bytes` is
/// called with the size of each chunk written. Cancellation is polled from
/// curl's progress callback (at least once per second, also while stalled).
///
/// Blocking; run it on the blocking pool.
pub fn fetch_to_target(
    descriptor: &Descriptor,
    target_dir: &Path,
    opts: &HttpOptions,
    cancel: &CancelToken,
    on_bytes: &mut dyn FnMut(u64),
) -> Result<u64, FetchError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }
    let url = descriptor.source_url();
    validate_url(url).map_err(FetchError::InvalidUrl)?;

    let final_path = target_dir.join(descriptor.target_name());
    let mut builder =
        StorageWriterBuilder::create(&storage::temp_path(&final_path)).map_err(FetchError::Storage)?;
    if let Some(size) = descriptor.expected_size() {
        builder.preallocate(size).map_err(FetchError::Storage)?;
    }
    let mut writer = builder.build();

    let mut easy = new_easy(url, opts).map_err(FetchError::Curl)?;
    easy.progress(true).map_err(FetchError::Curl)?;

    let mut storage_error: Option<std::io::Error> = None;
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match writer.append(data) {
                Ok(()) => {
                    on_bytes(data.len() as u64);
                    Ok(data.len())
                }
                Err(e) => {
                    storage_error = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(FetchError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(FetchError::Curl)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if e.is_write_error() {
            if let Some(io_err) = storage_error.take() {
                return Err(FetchError::Storage(io_err));
            }
        }
        return Err(FetchError::Curl(e));
    }

    let code = easy.response_code().map_err(FetchError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    let received = writer.written();
    if let Some(expected) = descriptor.expected_size() {
        if received != expected {
            return Err(FetchError::PartialTransfer { expected, received });
        }
    }

    writer.finalize(&final_path).map_err(FetchError::Storage)?;
    tracing::debug!(
        target_name = descriptor.target_name(),
        bytes = received,
        "published"
    );
    Ok(received)
}
