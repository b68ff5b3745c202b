// Segment task: fetch one segment and decrypt it if the playlist says so.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::crypto::{DecipherFactory, KeyCache};
use crate::error::SegmentError;
use crate::model::{SegmentDescriptor, resolve_location};
use crate::transport::Transport;

/// One fetch-and-decrypt attempt for the segment at `index`.
#[async_trait]
pub trait SegmentTask: Send + Sync {
    async fn fetch_and_decrypt(&self, index: usize) -> Result<Bytes, SegmentError>;
}

pub struct SegmentFetcher {
    segments: Arc<[SegmentDescriptor]>,
    base: Option<Url>,
    transport: Arc<dyn Transport>,
    deciphers: DecipherFactory,
}

impl SegmentFetcher {
    pub fn new(
        segments: Arc<[SegmentDescriptor]>,
        base: Option<Url>,
        transport: Arc<dyn Transport>,
        keys: KeyCache,
    ) -> Self {
        let deciphers = DecipherFactory::new(transport.clone(), base.clone(), keys);
        Self {
            segments,
            base,
            transport,
            deciphers,
        }
    }
}

#[async_trait]
impl SegmentTask for SegmentFetcher {
    async fn fetch_and_decrypt(&self, index: usize) -> Result<Bytes, SegmentError> {
        let segment = self.segments.get(index).ok_or(SegmentError::OutOfRange {
            index,
            len: self.segments.len(),
        })?;

        let url = resolve_location(self.base.as_ref(), &segment.location).map_err(|reason| {
            SegmentError::InvalidLocation {
                index,
                location: segment.location.clone(),
                reason,
            }
        })?;

        // The key must be in the cache before the payload is decrypted.
        let decipher = self.deciphers.decipher_for(segment, index).await?;

        let data = self
            .transport
            .fetch(&url)
            .await
            .map_err(|source| SegmentError::Fetch {
                index,
                url: url.to_string(),
                source,
            })?;

        let Some(decipher) = decipher else {
            debug!(index, len = data.len(), "Segment downloaded");
            return Ok(data);
        };

        let plaintext = decipher
            .decrypt(&data)
            .map_err(|reason| SegmentError::Decrypt { index, reason })?;
        debug!(
            index,
            encrypted_len = data.len(),
            len = plaintext.len(),
            "Segment downloaded and decrypted"
        );
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_iv;
    use crate::error::TransportError;
    use crate::model::EncryptionKeyRef;
    use crate::test_utils::{MockTransport, encrypt};

    fn fetcher(transport: Arc<MockTransport>, segments: Vec<SegmentDescriptor>) -> SegmentFetcher {
        let base = Url::parse("https://cdn.test/vod/index.m3u8").unwrap();
        SegmentFetcher::new(segments.into(), Some(base), transport, KeyCache::new())
    }

    #[tokio::test]
    async fn test_plain_segment_returned_verbatim() {
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://cdn.test/vod/seg0.ts", b"plain".to_vec());
        let fetcher = fetcher(transport, vec![SegmentDescriptor::new("seg0.ts")]);

        assert_eq!(fetcher.fetch_and_decrypt(0).await.unwrap(), &b"plain"[..]);
    }

    #[tokio::test]
    async fn test_encrypted_segment_uses_index_iv() {
        let key = [0x2au8; 16];
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://cdn.test/vod/k.key", key.to_vec());
        transport.insert(
            "https://cdn.test/vod/seg1.ts",
            encrypt(&key, &derive_iv(None, 1), b"second segment"),
        );
        let key_ref = EncryptionKeyRef::new("k.key");
        let fetcher = fetcher(
            transport,
            vec![
                SegmentDescriptor::new("seg0.ts").with_key(key_ref.clone()),
                SegmentDescriptor::new("seg1.ts").with_key(key_ref),
            ],
        );

        assert_eq!(fetcher.fetch_and_decrypt(1).await.unwrap(), &b"second segment"[..]);
    }

    #[tokio::test]
    async fn test_encrypted_segment_with_explicit_iv() {
        let key = [0x11u8; 16];
        let iv_words = [1, 2, 3, 4];
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://keys.test/k", key.to_vec());
        transport.insert(
            "https://cdn.test/vod/seg0.ts",
            encrypt(&key, &crate::crypto::pack_iv(iv_words), b"explicit iv"),
        );
        let fetcher = fetcher(
            transport,
            vec![SegmentDescriptor::new("seg0.ts")
                .with_key(EncryptionKeyRef::new("https://keys.test/k").with_iv(iv_words))],
        );

        assert_eq!(fetcher.fetch_and_decrypt(0).await.unwrap(), &b"explicit iv"[..]);
    }

    #[tokio::test]
    async fn test_errors_carry_index() {
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://cdn.test/vod/k.key", vec![1u8; 16]);
        transport.insert("https://cdn.test/vod/bad.ts", vec![0u8; 17]);
        let fetcher = fetcher(
            transport,
            vec![
                SegmentDescriptor::new("missing.ts"),
                SegmentDescriptor::new("bad.ts").with_key(EncryptionKeyRef::new("k.key")),
            ],
        );

        let err = fetcher.fetch_and_decrypt(0).await.unwrap_err();
        assert!(matches!(
            err,
            SegmentError::Fetch {
                index: 0,
                source: TransportError::Status { .. },
                ..
            }
        ));

        let err = fetcher.fetch_and_decrypt(1).await.unwrap_err();
        assert!(matches!(err, SegmentError::Decrypt { index: 1, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_index_past_end_is_fatal() {
        let transport = Arc::new(MockTransport::new());
        let fetcher = fetcher(transport.clone(), vec![SegmentDescriptor::new("seg0.ts")]);

        let err = fetcher.fetch_and_decrypt(3).await.unwrap_err();
        assert!(matches!(err, SegmentError::OutOfRange { index: 3, len: 1 }));
        assert!(err.is_fatal());
        assert_eq!(transport.total_calls(), 0);
    }
}
