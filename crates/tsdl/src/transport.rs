// Transport: single GET requests through a shared, optionally proxied HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use rustls::ClientConfig;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{DownloadError, TransportError};
use crate::proxy::build_proxy_from_config;
use crate::DownloaderConfig;

/// Longest response body echoed back in a status error
const MAX_ERROR_BODY: usize = 256;

/// Fetches raw bytes for a location.
///
/// Headers, proxy and timeouts are fixed when the transport is built, so a
/// single instance is shared read-only by every in-flight segment task.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    let proxy = match &config.proxy {
        Some(proxy_config) => Some((
            proxy_config,
            build_proxy_from_config(proxy_config).map_err(DownloadError::ProxyError)?,
        )),
        None => None,
    };

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_platform_verifier()?
        .with_no_client_auth();

    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if let Some(timeout) = config.timeout {
        client_builder = client_builder.timeout(timeout);
    }

    if let Some(connect_timeout) = config.connect_timeout {
        client_builder = client_builder.connect_timeout(connect_timeout);
    }

    if let Some((proxy_config, proxy)) = proxy {
        client_builder = client_builder.proxy(proxy);
        info!(
            proxy_kind = ?proxy_config.kind,
            proxy_address = %proxy_config.address,
            has_auth = proxy_config.auth.is_some(),
            "Using configured proxy for downloads"
        );
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(DownloadError::from)
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(TransportError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        debug!(url = %url, len = bytes.len(), "Fetched");
        Ok(bytes)
    }
}
