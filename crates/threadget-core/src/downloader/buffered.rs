//! In-memory GET for small documents (thread JSON).

use super::{new_easy, HttpOptions};

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// GETs `url` into memory. Non-2xx statuses are returned, not turned into
/// errors, so callers can map e.g. 404 to their own "not found".
///
/// Blocking; call from `spawn_blocking` when used from async code.
pub fn get_to_memory(url: &str, opts: &HttpOptions) -> Result<HttpResponse, curl::Error> {
    let mut body = Vec::new();
    let mut easy = new_easy(url, opts)?;
    easy.accept_encoding("")?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let status = easy.response_code()?;
    Ok(HttpResponse { status, body })
}
