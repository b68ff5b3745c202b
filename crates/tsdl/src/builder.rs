//! # Builder for DownloaderConfig
//!
//! Fluent construction of [`DownloaderConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tsdl_engine::DownloaderConfig;
//! use tsdl_engine::proxy::{ProxyConfig, ProxyKind};
//!
//! let config = DownloaderConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("Referer", "https://example.com/")
//!     .build();
//!
//! // A proxy without an explicit timeout gets the 10 second default
//! let config_with_proxy = DownloaderConfig::builder()
//!     .with_proxy(ProxyConfig::new(ProxyKind::Socks5, "127.0.0.1:1080").with_auth("user", "pass"))
//!     .build();
//! assert_eq!(config_with_proxy.timeout, Some(Duration::from_secs(10)));
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::config::DEFAULT_PROXY_TIMEOUT;
use crate::{DownloaderConfig, proxy::ProxyConfig};

/// Builder for creating DownloaderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
    timeout_set: bool,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
            timeout_set: false,
        }
    }

    /// Set the overall timeout for each request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self.timeout_set = true;
        self
    }

    /// Disable the overall request timeout, even when a proxy is configured
    pub fn without_timeout(mut self) -> Self {
        self.config.timeout = None;
        self.timeout_set = true;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.headers.insert(name, value);
            }
            _ => warn!(header = %name.as_ref(), "Skipping invalid header"),
        }
        self
    }

    /// Merge headers into the defaults; provided names replace the default
    /// values and keep every value given for them
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for name in headers.keys() {
            self.config.headers.remove(name);
        }
        for (name, value) in headers.iter() {
            self.config.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Set the proxy configuration
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Build the DownloaderConfig instance
    pub fn build(mut self) -> DownloaderConfig {
        if self.config.proxy.is_some() && !self.timeout_set {
            self.config.timeout = Some(DEFAULT_PROXY_TIMEOUT);
        }
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ProxyAuth, ProxyKind};

    #[test]
    fn test_builder_defaults() {
        let config = DownloaderConfigBuilder::new().build();
        assert_eq!(config.timeout, None);
        assert_eq!(config.connect_timeout, None);
        assert!(config.follow_redirects);
        assert!(config.proxy.is_none());
        assert_eq!(config.user_agent, crate::config::DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_builder_customization() {
        let config = DownloaderConfigBuilder::new()
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(20))
            .with_follow_redirects(false)
            .with_user_agent("CustomUserAgent/1.0")
            .with_header("X-Custom-Header", "CustomValue")
            .with_header("Bad Header", "ignored")
            .build();

        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(20)));
        assert!(!config.follow_redirects);
        assert_eq!(config.user_agent, "CustomUserAgent/1.0");

        let header_value = config.headers.get("X-Custom-Header").unwrap();
        assert_eq!(header_value.to_str().unwrap(), "CustomValue");
        assert!(config.headers.get("Bad Header").is_none());
    }

    #[test]
    fn test_proxy_gets_default_timeout() {
        let proxy_config = ProxyConfig {
            kind: ProxyKind::Http,
            address: "proxy.example.com:8080".to_string(),
            auth: Some(ProxyAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        };

        let config = DownloaderConfigBuilder::new()
            .with_proxy(proxy_config.clone())
            .build();
        assert_eq!(config.timeout, Some(DEFAULT_PROXY_TIMEOUT));
        assert_eq!(config.proxy, Some(proxy_config.clone()));

        // An explicit choice wins, including "no timeout"
        let config = DownloaderConfigBuilder::new()
            .without_timeout()
            .with_proxy(proxy_config)
            .build();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_with_headers_merges_over_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("video/mp2t"));
        let config = DownloaderConfigBuilder::new().with_headers(headers).build();

        assert_eq!(config.headers.get(reqwest::header::ACCEPT).unwrap(), "video/mp2t");
        assert!(config.headers.get(reqwest::header::CONNECTION).is_some());
    }

    #[test]
    fn test_with_headers_keeps_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append(reqwest::header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(reqwest::header::COOKIE, HeaderValue::from_static("b=2"));
        headers.append(reqwest::header::ACCEPT, HeaderValue::from_static("video/mp2t"));
        let config = DownloaderConfigBuilder::new().with_headers(headers).build();

        let cookies: Vec<_> = config.headers.get_all(reqwest::header::COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(config.headers.get_all(reqwest::header::ACCEPT).iter().count(), 1);
    }
}
