//! Fetch error type for retry classification.

/// Error returned by a single fetch attempt (curl failure, HTTP error, short
/// body, storage failure or cancellation). Kept concrete so it can be
/// classified before it is flattened into a report message.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Source URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[source] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Transfer completed but the body length differs from the expected size
    /// (e.g. server closed early). Retried instead of publishing a short file.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Disk/storage failure (e.g. disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
    /// The run was cancelled while this attempt was pending or in flight.
    #[error("cancelled")]
    Cancelled,
    /// The blocking transfer task panicked or was torn down.
    #[error("internal: {0}")]
    Internal(String),
}
