// Key cache and AES-128-CBC decipher construction for encrypted segments.

use std::sync::Arc;

use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use moka::future::Cache;
use tracing::debug;
use url::Url;

use crate::error::{SegmentError, TransportError};
use crate::model::{SegmentDescriptor, resolve_location};
use crate::transport::Transport;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128 key and block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Packs four 32-bit words big-endian into a 16-byte IV.
pub fn pack_iv(words: [u32; 4]) -> [u8; AES_BLOCK_SIZE] {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    for (chunk, word) in iv.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    iv
}

/// IV for the segment at `index`: the explicit one if the playlist carries it,
/// otherwise `{0, 0, 0, index + 1}`.
pub fn derive_iv(explicit: Option<[u32; 4]>, index: usize) -> [u8; AES_BLOCK_SIZE] {
    // The implicit IV is a 32-bit word; larger positions wrap.
    let words = explicit.unwrap_or([0, 0, 0, (index as u32).wrapping_add(1)]);
    pack_iv(words)
}

/// Per-segment AES-128-CBC decryption context.
#[derive(Clone)]
pub struct Decipher {
    key: Bytes,
    iv: [u8; AES_BLOCK_SIZE],
}

impl std::fmt::Debug for Decipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decipher")
            .field("key_len", &self.key.len())
            .field("iv", &hex::encode(self.iv))
            .finish()
    }
}

impl Decipher {
    pub fn new(key: Bytes, iv: [u8; AES_BLOCK_SIZE]) -> Self {
        Self { key, iv }
    }

    pub fn iv(&self) -> &[u8; AES_BLOCK_SIZE] {
        &self.iv
    }

    /// Decrypts a whole payload and strips PKCS#7 padding.
    pub fn decrypt(&self, data: &[u8]) -> Result<Bytes, String> {
        let cipher = Aes128CbcDec::new_from_slices(&self.key, &self.iv).map_err(|_| {
            format!(
                "invalid key length: {} bytes (expected {AES_BLOCK_SIZE})",
                self.key.len()
            )
        })?;

        let mut buffer = data.to_vec();
        let decrypted_len = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|e| format!("bad ciphertext ({} bytes): {e}", data.len()))?
            .len();
        buffer.truncate(decrypted_len);

        Ok(Bytes::from(buffer))
    }
}

/// Session-scoped key store.
///
/// Concurrent first requests for one location share a single fetch; a failed
/// fetch is not memoized so the next attempt fetches again.
#[derive(Clone)]
pub struct KeyCache {
    keys: Cache<Url, Bytes>,
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            keys: Cache::builder().build(),
        }
    }

    /// Returns the key bytes for `url`, fetching them on first use.
    pub async fn get_or_fetch(
        &self,
        url: &Url,
        transport: &dyn Transport,
    ) -> Result<Bytes, Arc<TransportError>> {
        self.keys
            .try_get_with(url.clone(), async {
                debug!(key_url = %url, "Fetching decryption key");
                transport.fetch(url).await
            })
            .await
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.keys.contains_key(url)
    }
}

/// Builds [`Decipher`]s for segments, resolving keys through the session cache.
pub struct DecipherFactory {
    transport: Arc<dyn Transport>,
    base: Option<Url>,
    keys: KeyCache,
}

impl DecipherFactory {
    pub fn new(transport: Arc<dyn Transport>, base: Option<Url>, keys: KeyCache) -> Self {
        Self {
            transport,
            base,
            keys,
        }
    }

    /// `None` means the segment is not encrypted and passes through.
    pub async fn decipher_for(
        &self,
        segment: &SegmentDescriptor,
        index: usize,
    ) -> Result<Option<Decipher>, SegmentError> {
        let Some(key_ref) = &segment.key else {
            return Ok(None);
        };

        let key_url = resolve_location(self.base.as_ref(), &key_ref.key_location).map_err(
            |reason| SegmentError::InvalidLocation {
                index,
                location: key_ref.key_location.clone(),
                reason,
            },
        )?;

        let key = self
            .keys
            .get_or_fetch(&key_url, self.transport.as_ref())
            .await
            .map_err(|source| SegmentError::KeyFetch {
                index,
                url: key_url.to_string(),
                source,
            })?;

        Ok(Some(Decipher::new(key, derive_iv(key_ref.iv, index))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncryptionKeyRef;
    use crate::test_utils::{MockTransport, encrypt};

    #[test]
    fn test_default_iv_is_index_plus_one() {
        let iv = derive_iv(None, 0);
        assert_eq!(iv, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

        let iv = derive_iv(None, 0x0102_0304 - 1);
        assert_eq!(&iv[..12], &[0u8; 12]);
        assert_eq!(&iv[12..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_explicit_iv_packed_big_endian() {
        let iv = derive_iv(Some([0x00112233, 0x44556677, 0x8899aabb, 0xccddeeff]), 7);
        assert_eq!(hex::encode(iv), "00112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_decrypt_roundtrip_strips_padding() {
        let key = [7u8; 16];
        let iv = derive_iv(None, 3);
        let plaintext = b"transport stream payload";
        let ciphertext = encrypt(&key, &iv, plaintext);
        assert_eq!(ciphertext.len() % AES_BLOCK_SIZE, 0);

        let decipher = Decipher::new(Bytes::copy_from_slice(&key), iv);
        assert_eq!(decipher.decrypt(&ciphertext).unwrap(), &plaintext[..]);
    }

    #[test]
    fn test_decrypt_rejects_bad_key_and_ciphertext() {
        let short_key = Decipher::new(Bytes::from_static(b"short"), [0; 16]);
        let err = short_key.decrypt(&[0u8; 16]).unwrap_err();
        assert!(err.contains("invalid key length"));

        let decipher = Decipher::new(Bytes::from_static(&[1u8; 16]), [0; 16]);
        assert!(decipher.decrypt(&[0u8; 15]).is_err());
    }

    #[tokio::test]
    async fn test_unencrypted_segment_passes_through() {
        let transport = Arc::new(MockTransport::new());
        let factory = DecipherFactory::new(transport.clone(), None, KeyCache::new());

        let decipher = factory
            .decipher_for(&SegmentDescriptor::new("https://h/seg0.ts"), 0)
            .await
            .unwrap();
        assert!(decipher.is_none());
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_key_fetched_once_per_location() {
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://h/key.bin", vec![9u8; 16]);
        let base = Url::parse("https://h/index.m3u8").unwrap();
        let factory = Arc::new(DecipherFactory::new(
            transport.clone(),
            Some(base),
            KeyCache::new(),
        ));
        let segment = SegmentDescriptor::new("seg.ts").with_key(EncryptionKeyRef::new("key.bin"));

        let mut handles = Vec::new();
        for index in 0..8 {
            let factory = factory.clone();
            let segment = segment.clone();
            handles.push(tokio::spawn(async move {
                factory.decipher_for(&segment, index).await
            }));
        }
        for (index, handle) in handles.into_iter().enumerate() {
            let decipher = handle.await.unwrap().unwrap().unwrap();
            assert_eq!(decipher.iv(), &derive_iv(None, index));
        }

        assert_eq!(transport.calls("https://h/key.bin"), 1);
    }

    #[tokio::test]
    async fn test_key_fetch_failure_is_retried_not_memoized() {
        let transport = Arc::new(MockTransport::new());
        transport.insert("https://h/key.bin", vec![9u8; 16]);
        transport.fail_times("https://h/key.bin", 1);
        let keys = KeyCache::new();
        let factory = DecipherFactory::new(transport.clone(), None, keys.clone());
        let segment =
            SegmentDescriptor::new("https://h/s.ts").with_key(EncryptionKeyRef::new("https://h/key.bin"));

        let err = factory.decipher_for(&segment, 4).await.unwrap_err();
        assert!(matches!(err, SegmentError::KeyFetch { index: 4, .. }));
        assert!(!keys.contains(&Url::parse("https://h/key.bin").unwrap()));

        assert!(factory.decipher_for(&segment, 4).await.unwrap().is_some());
        assert_eq!(transport.calls("https://h/key.bin"), 2);
    }

    #[tokio::test]
    async fn test_relative_key_without_base_is_invalid_location() {
        let transport = Arc::new(MockTransport::new());
        let factory = DecipherFactory::new(transport, None, KeyCache::new());
        let segment = SegmentDescriptor::new("https://h/s.ts").with_key(EncryptionKeyRef::new("key.bin"));

        let err = factory.decipher_for(&segment, 2).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.index(), 2);
    }
}
