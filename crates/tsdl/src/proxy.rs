use reqwest::Proxy;
use serde::{Deserialize, Serialize};

/// Proxy kinds understood by the transport
#[derive(Debug, Clone, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyKind {
    /// SOCKS5 proxy
    Socks5,
    /// HTTP proxy (used for both http and https targets)
    Http,
}

/// Proxy authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAuth {
    /// Username for proxy authentication
    pub username: String,
    /// Password for proxy authentication
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub kind: ProxyKind,
    /// Proxy address as `host:port`. A scheme prefix is accepted and kept.
    pub address: String,
    /// Credentials (optional)
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(kind: ProxyKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Full proxy URL with the scheme implied by `kind`.
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        match self.kind {
            // socks5h resolves hostnames on the proxy side
            ProxyKind::Socks5 => format!("socks5h://{}", self.address),
            ProxyKind::Http => format!("http://{}", self.address),
        }
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, String> {
    let proxy_url = config.url();

    let mut proxy = match config.kind {
        ProxyKind::Socks5 => {
            Proxy::all(&proxy_url).map_err(|e| format!("Invalid SOCKS5 proxy URL: {e}"))?
        }
        ProxyKind::Http => {
            Proxy::all(&proxy_url).map_err(|e| format!("Invalid HTTP proxy URL: {e}"))?
        }
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
