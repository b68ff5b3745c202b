//! # tsdl
//!
//! Download engine for segmented media playlists (HLS-style). Given an
//! already-parsed, ordered list of segments it fetches them with bounded
//! concurrency, decrypts AES-128 segments, and writes the payloads in
//! playlist order.
//!
//! ## Features
//!
//! - Fixed-width batches with a retry budget per batch
//! - Keys fetched once per session and shared by every segment using them
//! - HTTP and SOCKS5 proxies with credentials
//! - Output strictly in playlist order regardless of completion order

pub mod builder;
pub mod config;
pub mod crypto;
pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod output;
pub mod progress;
pub mod proxy;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::DownloaderConfigBuilder;
pub use config::{DownloadOptions, DownloaderConfig};
pub use crypto::{Decipher, DecipherFactory, KeyCache, derive_iv};
pub use downloader::{
    DownloadSession, DownloadSummary, SessionFailure, download, download_file_with_transport,
    download_to_file, download_with_transport,
};
pub use error::{DownloadError, SegmentError, TransportError};
pub use fetcher::{SegmentFetcher, SegmentTask};
pub use model::{EncryptionKeyRef, Playlist, SegmentDescriptor, resolve_location};
pub use output::OutputAssembler;
pub use progress::{DownloadEvent, ProgressSink, ProgressSnapshot};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyKind};
pub use scheduler::{BatchOutcome, SegmentScheduler, batch_ranges};
pub use transport::{HttpTransport, Transport, create_client};
