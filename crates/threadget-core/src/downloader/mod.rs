//! HTTP fetcher built on curl easy handles.
//!
//! `fetch_to_target` performs one streaming GET of a descriptor into its temp
//! file and publishes it by rename; `fetch_with_retry` layers the retry
//! policy on top. `get_to_memory` serves small documents such as the thread
//! JSON.

mod buffered;
mod retrying;
mod transfer;

pub use buffered::{get_to_memory, HttpResponse};
pub use retrying::fetch_with_retry;
pub use transfer::fetch_to_target;

use std::time::Duration;

/// Timeouts and identity applied to every request.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Limit for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Wall-clock limit for the whole request.
    pub request_timeout: Duration,
    /// Abort when fewer than `low_speed_limit` bytes/s arrive for this long.
    pub idle_timeout: Duration,
    pub low_speed_limit: u32,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(600),
            idle_timeout: Duration::from_secs(30),
            low_speed_limit: 1,
            user_agent: concat!("threadget/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// New easy handle for a GET of `url` with `opts` applied.
pub(crate) fn new_easy(url: &str, opts: &HttpOptions) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(&opts.user_agent)?;
    easy.connect_timeout(opts.connect_timeout)?;
    easy.timeout(opts.request_timeout)?;
    // Idle-read timeout: data must keep flowing or the attempt is abandoned.
    easy.low_speed_limit(opts.low_speed_limit.max(1))?;
    easy.low_speed_time(opts.idle_timeout)?;
    Ok(easy)
}

/// Rejects URLs curl should never see: unparseable or not http(s).
pub(crate) fn validate_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("{}: {}", url, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{}: unsupported scheme {:?}", url, other)),
    }
}
