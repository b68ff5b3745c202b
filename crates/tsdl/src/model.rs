//! Playlist data consumed by the engine.
//!
//! The engine never parses playlist text. Callers hand it an ordered list of
//! [`SegmentDescriptor`]s; a segment's position in that list is its index.

use serde::{Deserialize, Serialize};
use url::Url;

/// Reference to the key that encrypts a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKeyRef {
    /// Absolute URL or path relative to the base location.
    #[serde(rename = "uri")]
    pub key_location: String,
    /// Explicit IV as four big-endian 32-bit words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<[u32; 4]>,
}

impl EncryptionKeyRef {
    pub fn new(key_location: impl Into<String>) -> Self {
        Self {
            key_location: key_location.into(),
            iv: None,
        }
    }

    pub fn with_iv(mut self, iv: [u32; 4]) -> Self {
        self.iv = Some(iv);
        self
    }
}

/// One playlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    #[serde(rename = "uri")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<EncryptionKeyRef>,
}

impl SegmentDescriptor {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: EncryptionKeyRef) -> Self {
        self.key = Some(key);
        self
    }
}

/// An already-parsed media playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub segments: Vec<SegmentDescriptor>,
}

impl Playlist {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Resolves a segment or key location.
///
/// `http`/`https` locations are used as-is; anything else is joined onto
/// `base`. Fails when the location is relative and there is no base.
pub fn resolve_location(base: Option<&Url>, location: &str) -> Result<Url, String> {
    if let Ok(url) = Url::parse(location) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }

    match base {
        Some(base) => base
            .join(location)
            .map_err(|e| format!("could not join base {base} with {location}: {e}")),
        None => Err("no base location and not an http(s) location".to_string()),
    }
}
