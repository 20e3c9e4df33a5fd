//! Extraction and validation of the `download` deep-link parameter.

use std::borrow::Cow;

use thiserror::Error;
use url::Url;

/// Reserved parameter carrying the pending download.
pub const DOWNLOAD_PARAM: &str = "download";
/// Longest accepted value, in characters.
pub const MAX_DOWNLOAD_LEN: usize = 8_192;

const MAGNET_PREFIX: &str = "magnet:";
const INFO_HASH_TOPIC: &str = "xt=urn:btih:";
const TORRENT_EXTENSION: &str = ".torrent";

/// Reason a captured value was discarded.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InvalidDownload {
    /// Nothing after trimming.
    #[error("download value is empty")]
    Empty,
    /// Longer than [`MAX_DOWNLOAD_LEN`].
    #[error("download value is too long")]
    TooLong {
        /// Length in characters.
        len: usize,
    },
    /// Contains a carriage return or line feed.
    #[error("download value contains a line break")]
    LineBreak,
    /// Magnet reference without an info-hash topic.
    #[error("magnet reference has no info-hash topic")]
    MissingInfoHash,
    /// Neither a magnet reference nor an absolute http(s) URL.
    #[error("download value is not a magnet or http(s) URL")]
    UnsupportedScheme,
    /// http(s) URL whose path does not name a `.torrent` file.
    #[error("download URL does not point at a .torrent file")]
    NotTorrentFile,
}

/// Pull the `download` parameter out of an address, fragment first, then query.
///
/// The fragment may be a bare parameter list (`#download=..`) or a route with
/// its own query (`#/add?download=..`). Relative addresses are resolved against
/// a placeholder origin. The returned value is percent-decoded.
#[must_use]
pub fn extract_download_param(address: &str) -> Option<String> {
    let url = Url::parse(address)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(address)))
        .ok()?;

    let from_fragment = url.fragment().and_then(|fragment| {
        let params = match fragment.split_once('?') {
            Some((route, query)) if !route.contains('=') => query,
            _ => fragment,
        };
        find_param(params)
    });

    from_fragment.or_else(|| url.query().and_then(find_param))
}

fn find_param(params: &str) -> Option<String> {
    params
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == DOWNLOAD_PARAM).then_some(value)
        })
        .next()
        .map(|raw| {
            urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
        })
}

/// Check a captured value and return its canonical (trimmed) form.
///
/// # Errors
///
/// Returns the first [`InvalidDownload`] reason that applies, checked in order:
/// empty, too long, line break, then the magnet or `.torrent` URL shape.
pub fn validate_download(value: &str) -> Result<String, InvalidDownload> {
    let candidate = value.trim();
    if candidate.is_empty() {
        return Err(InvalidDownload::Empty);
    }
    // Measured before trimming: padding counts toward the limit.
    let len = value.chars().count();
    if len > MAX_DOWNLOAD_LEN {
        return Err(InvalidDownload::TooLong { len });
    }
    if candidate.contains(['\r', '\n']) {
        return Err(InvalidDownload::LineBreak);
    }

    let lowered = candidate.to_ascii_lowercase();
    if lowered.starts_with(MAGNET_PREFIX) {
        return if lowered.contains(INFO_HASH_TOPIC) {
            Ok(candidate.to_string())
        } else {
            Err(InvalidDownload::MissingInfoHash)
        };
    }

    let url = Url::parse(candidate).map_err(|_| InvalidDownload::UnsupportedScheme)?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(InvalidDownload::UnsupportedScheme);
    }
    if url.path().to_ascii_lowercase().ends_with(TORRENT_EXTENSION) {
        Ok(candidate.to_string())
    } else {
        Err(InvalidDownload::NotTorrentFile)
    }
}
