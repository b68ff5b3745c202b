use std::sync::Arc;

use reqwest::StatusCode;

/// Failure of a single GET issued through a [`Transport`](crate::transport::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Response code: {status}{}", body_suffix(.body))]
    Status { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(". Body: {body}")
    }
}

/// Error raised by one fetch-and-decrypt attempt. Every variant carries the
/// segment index so the scheduler can requeue exactly that index.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("Segment {index}: invalid location '{location}': {reason}")]
    InvalidLocation {
        index: usize,
        location: String,
        reason: String,
    },

    #[error("Segment {index}: fetch of {url} failed: {source}")]
    Fetch {
        index: usize,
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Segment {index}: key fetch of {url} failed: {source}")]
    KeyFetch {
        index: usize,
        url: String,
        #[source]
        source: Arc<TransportError>,
    },

    #[error("Segment {index}: decryption failed: {reason}")]
    Decrypt { index: usize, reason: String },

    #[error("Segment {index}: not in playlist of {len} segments")]
    OutOfRange { index: usize, len: usize },
}

impl SegmentError {
    pub fn index(&self) -> usize {
        match self {
            SegmentError::InvalidLocation { index, .. }
            | SegmentError::Fetch { index, .. }
            | SegmentError::KeyFetch { index, .. }
            | SegmentError::Decrypt { index, .. }
            | SegmentError::OutOfRange { index, .. } => *index,
        }
    }

    /// Fatal errors abort the session instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SegmentError::InvalidLocation { .. } | SegmentError::OutOfRange { .. }
        )
    }
}

/// Session-level error returned by the download entry point.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Batch {batch}: {unresolved} parts not downloaded")]
    BatchExhausted { batch: usize, unresolved: usize },

    #[error("Segment {index} appended out of order (last written: {last})")]
    OutOfOrder { index: usize, last: usize },

    #[error("Invalid proxy configuration: {0}")]
    ProxyError(String),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("TLS configuration error: {0}")]
    TlsError(#[from] rustls::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Segment task failed: {0}")]
    TaskError(String),
}
