//! Playlist sources: JSON segment lists and M3U8 media playlists, read from
//! disk or fetched over HTTP(S).

use std::path::Path;

use m3u8_rs::{ExtTag, Key, KeyMethod, MediaPlaylist};
use tracing::{debug, info};
use tsdl_engine::{EncryptionKeyRef, Playlist, SegmentDescriptor, Transport};
use url::Url;

use crate::error::AppError;

/// Segments to download and the base their relative locations resolve against.
#[derive(Debug)]
pub struct LoadedPlaylist {
    pub segments: Vec<SegmentDescriptor>,
    pub base: Option<Url>,
    /// Name used for the default output file
    pub name: String,
}

/// Loads `input`, which is either an http(s) URL or a local path.
///
/// A fetched playlist's own URL becomes the base unless `base` is given.
pub async fn load_playlist(
    input: &str,
    base: Option<Url>,
    transport: &dyn Transport,
) -> Result<LoadedPlaylist, AppError> {
    let remote = Url::parse(input)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"));

    let (content, name, base) = match remote {
        Some(url) => {
            info!(url = %url, "Fetching playlist");
            let content = transport
                .fetch(&url)
                .await
                .map_err(|e| AppError::Playlist(format!("failed to fetch {url}: {e}")))?;
            let name = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|last| !last.is_empty())
                .map(file_stem)
                .unwrap_or_else(|| "playlist".to_string());
            (content.to_vec(), name, base.or(Some(url)))
        }
        None => {
            let path = Path::new(input);
            let content = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|name| file_stem(&name.to_string_lossy()))
                .unwrap_or_else(|| "playlist".to_string());
            (content, name, base)
        }
    };

    let segments = parse_playlist(&content)?;
    info!(segments = segments.len(), name = %name, "Playlist loaded");
    Ok(LoadedPlaylist {
        segments,
        base,
        name,
    })
}

fn file_stem(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => file_name[..pos].to_string(),
        _ => file_name.to_string(),
    }
}

/// Parses a JSON segment list (`{"segments": [...]}`) or M3U8 text.
pub fn parse_playlist(content: &[u8]) -> Result<Vec<SegmentDescriptor>, AppError> {
    let trimmed = content.trim_ascii_start();
    if trimmed.starts_with(b"{") {
        let text = std::str::from_utf8(trimmed)
            .map_err(|e| AppError::Playlist(format!("playlist is not UTF-8: {e}")))?;
        let playlist = Playlist::from_json(text)
            .map_err(|e| AppError::Playlist(format!("invalid JSON playlist: {e}")))?;
        return Ok(playlist.segments);
    }

    match m3u8_rs::parse_playlist_res(content) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(playlist)) => media_segments(playlist),
        Ok(m3u8_rs::Playlist::MasterPlaylist(master)) => {
            let variants: Vec<String> = master
                .variants
                .iter()
                .map(|v| format!("{} ({} bps)", v.uri, v.bandwidth))
                .collect();
            Err(AppError::Playlist(format!(
                "master playlist given; choose one of its media playlists: {}",
                variants.join(", ")
            )))
        }
        Err(_) => Err(AppError::Playlist("not a valid M3U8 playlist".to_string())),
    }
}

/// Maps media segments to descriptors. An `EXT-X-KEY` applies to every
/// following segment until the next one.
fn media_segments(playlist: MediaPlaylist) -> Result<Vec<SegmentDescriptor>, AppError> {
    let mut current_key: Option<EncryptionKeyRef> = None;
    let mut segments = Vec::with_capacity(playlist.segments.len());

    for segment in playlist.segments {
        if let Some(key) = &segment.key {
            current_key = key_ref(key)?;
        } else if clears_key(&segment.unknown_tags)? {
            current_key = None;
        }
        segments.push(SegmentDescriptor {
            location: segment.uri,
            key: current_key.clone(),
        });
    }

    debug!(
        segments = segments.len(),
        encrypted = segments.iter().filter(|s| s.key.is_some()).count(),
        "Parsed media playlist"
    );
    Ok(segments)
}

/// m3u8-rs refuses `METHOD=NONE` without an IV and keeps the tag as an
/// unknown `X-KEY`; that tag still ends encryption.
fn clears_key(unknown_tags: &[ExtTag]) -> Result<bool, AppError> {
    let mut clears = false;
    for tag in unknown_tags.iter().filter(|tag| tag.tag == "X-KEY") {
        let attrs = tag.rest.as_deref().unwrap_or_default();
        let method = attrs
            .split(',')
            .filter_map(|attr| attr.split_once('='))
            .find(|(name, _)| name.trim() == "METHOD")
            .map(|(_, value)| value.trim().trim_matches('"'));
        match method {
            Some("NONE") => clears = true,
            _ => {
                return Err(AppError::Playlist(format!(
                    "malformed EXT-X-KEY tag: {attrs}"
                )));
            }
        }
    }
    Ok(clears)
}

fn key_ref(key: &Key) -> Result<Option<EncryptionKeyRef>, AppError> {
    match &key.method {
        KeyMethod::None => Ok(None),
        KeyMethod::AES128 => {
            let uri = key
                .uri
                .clone()
                .ok_or_else(|| AppError::Playlist("AES-128 key without URI".to_string()))?;
            let iv = key.iv.as_deref().map(parse_iv).transpose()?;
            Ok(Some(EncryptionKeyRef { key_location: uri, iv }))
        }
        other => Err(AppError::Playlist(format!(
            "unsupported encryption method: {other:?}"
        ))),
    }
}

/// Parses an `IV=0x...` attribute into four big-endian words.
fn parse_iv(iv: &str) -> Result<[u32; 4], AppError> {
    let hex_str = iv.trim_start_matches("0x").trim_start_matches("0X");
    let mut bytes = [0u8; 16];
    hex::decode_to_slice(hex_str, &mut bytes)
        .map_err(|e| AppError::Playlist(format!("invalid IV '{iv}': {e}")))?;

    let mut words = [0u32; 4];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}
