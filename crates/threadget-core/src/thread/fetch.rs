//! Thread document download and on-disk snapshot.

use std::io;
use std::path::{Path, PathBuf};

use super::{Thread, ThreadError, ThreadUrl};
use crate::downloader::{get_to_memory, HttpOptions};
use crate::storage::write_atomic;

/// File name of the pretty-printed snapshot written next to the media.
pub const THREAD_JSON_NAME: &str = "thread.json";

/// GETs the thread's API document. 404 becomes `ThreadError::NotFound`
/// (the thread was pruned or never existed); other non-2xx statuses are
/// `ThreadError::Http`.
pub async fn fetch_thread_json(
    url: &ThreadUrl,
    api_base: &str,
    opts: &HttpOptions,
) -> Result<Vec<u8>, ThreadError> {
    let endpoint = url.api_endpoint(api_base);
    tracing::debug!(endpoint = %endpoint, "fetching thread");
    let opts = opts.clone();
    let request_url = endpoint.clone();
    let response = tokio::task::spawn_blocking(move || get_to_memory(&request_url, &opts))
        .await
        .map_err(|e| ThreadError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?
        .map_err(ThreadError::Transport)?;
    match response.status {
        200..=299 => Ok(response.body),
        404 => Err(ThreadError::NotFound(endpoint)),
        status => Err(ThreadError::Http {
            url: endpoint,
            status,
        }),
    }
}

/// Writes the thread document, pretty-printed, to `<dir>/thread.json`
/// through a temp file and rename. Returns the written path.
pub fn save_thread_json(thread: &Thread, dir: &Path) -> Result<PathBuf, ThreadError> {
    let path = dir.join(THREAD_JSON_NAME);
    let mut pretty = serde_json::to_vec_pretty(thread.raw()).map_err(ThreadError::Json)?;
    pretty.push(b'\n');
    write_atomic(&path, &pretty).map_err(ThreadError::Io)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_pretty_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let json = br#"{"posts":[{"no":1,"tim":5,"ext":".jpg","extra":"kept"}]}"#;
        let thread = Thread::from_json(ThreadUrl::new("g", 1), json).unwrap();
        let path = save_thread_json(&thread, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("thread.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"posts\""));
        assert!(text.contains("\"extra\": \"kept\""));
        assert!(!dir.path().join("thread.json.part").exists());
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let opts = HttpOptions {
            connect_timeout: std::time::Duration::from_secs(2),
            ..HttpOptions::default()
        };
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let base = format!("http://127.0.0.1:{}", port);
        let err = fetch_thread_json(&ThreadUrl::new("g", 1), &base, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ThreadError::Transport(_)));
    }
}
