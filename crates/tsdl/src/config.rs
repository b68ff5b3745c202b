use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:57.0) Gecko/20100101 Firefox/57.0";

/// Timeout applied to every request when a proxy is configured and no
/// explicit timeout was chosen.
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_CONCURRENCY_WIDTH: usize = 5;
pub const DEFAULT_RETRY_ROUNDS: usize = 5;

/// Transport configuration: identity headers, proxy and timeouts.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for each request. `None` disables it.
    pub timeout: Option<Duration>,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Option<Duration>,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("*/*"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers
    }
}

/// Scheduling knobs of one download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Number of segments fetched concurrently, which is also the batch width.
    pub concurrency_width: usize,
    /// Number of sweep rounds each batch gets before the session fails.
    pub retry_rounds: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency_width: DEFAULT_CONCURRENCY_WIDTH,
            retry_rounds: DEFAULT_RETRY_ROUNDS,
        }
    }
}

impl DownloadOptions {
    pub fn new(concurrency_width: usize, retry_rounds: usize) -> Self {
        Self {
            concurrency_width,
            retry_rounds,
        }
        .normalized()
    }

    /// Zero means "unset" and falls back to the default.
    pub fn normalized(self) -> Self {
        Self {
            concurrency_width: if self.concurrency_width == 0 {
                DEFAULT_CONCURRENCY_WIDTH
            } else {
                self.concurrency_width
            },
            retry_rounds: if self.retry_rounds == 0 {
                DEFAULT_RETRY_ROUNDS
            } else {
                self.retry_rounds
            },
        }
    }
}
