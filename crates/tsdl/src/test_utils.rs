//! In-memory transport and helpers shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use aes::Aes128;
use async_trait::async_trait;
use bytes::Bytes;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use reqwest::StatusCode;
use url::Url;

use crate::crypto::AES_BLOCK_SIZE;
use crate::error::TransportError;
use crate::transport::Transport;

/// Initialize tracing for tests
///
/// Usage:
/// - `init_test_tracing!()` - uses DEBUG level (default)
/// - `init_test_tracing!(INFO)` - uses specified level
macro_rules! init_test_tracing {
    () => {
        $crate::test_utils::init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}
pub(crate) use init_test_tracing;

#[derive(Default)]
struct Route {
    body: Option<Bytes>,
    fail_remaining: usize,
    always_fail: bool,
    delay: Option<Duration>,
    calls: usize,
}

/// Transport serving canned bodies, with per-URL failure and delay injection.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, body: impl Into<Bytes>) {
        self.routes.lock().unwrap().entry(url.to_string()).or_default().body = Some(body.into());
    }

    /// The next `times` requests for `url` fail with a 503.
    pub fn fail_times(&self, url: &str, times: usize) {
        self.routes.lock().unwrap().entry(url.to_string()).or_default().fail_remaining = times;
    }

    pub fn always_fail(&self, url: &str) {
        self.routes.lock().unwrap().entry(url.to_string()).or_default().always_fail = true;
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.routes.lock().unwrap().entry(url.to_string()).or_default().delay = Some(delay);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .map(|route| route.calls)
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.routes.lock().unwrap().values().map(|route| route.calls).sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &Url) -> Result<Bytes, TransportError> {
        let (delay, outcome) = {
            let mut routes = self.routes.lock().unwrap();
            let route = routes.entry(url.to_string()).or_default();
            route.calls += 1;

            let outcome = if route.always_fail {
                Err(StatusCode::SERVICE_UNAVAILABLE)
            } else if route.fail_remaining > 0 {
                route.fail_remaining -= 1;
                Err(StatusCode::SERVICE_UNAVAILABLE)
            } else {
                route.body.clone().ok_or(StatusCode::NOT_FOUND)
            };
            (route.delay, outcome)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        outcome.map_err(|status| TransportError::Status {
            status,
            body: String::new(),
        })
    }
}

/// AES-128-CBC encrypts `plaintext` with PKCS#7 padding.
pub fn encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let len = plaintext.len();
    let mut buffer = plaintext.to_vec();
    buffer.resize(len + AES_BLOCK_SIZE, 0);

    let encrypted_len = cbc::Encryptor::<Aes128>::new(key.into(), iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, len)
        .unwrap()
        .len();
    buffer.truncate(encrypted_len);
    buffer
}

/// Deterministic payload for segment `index`, sized differently per index.
pub fn segment_payload(index: usize) -> Vec<u8> {
    (0..(100 + index * 7)).map(|i| (i + index) as u8).collect()
}
