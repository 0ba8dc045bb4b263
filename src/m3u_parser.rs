//! M3U playlist parser with HTTPS download, gzip and clear-key annotations

use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use crate::error::DirectoryError;
use crate::models::{Channel, ClearKey};

/// Playlists larger than this are rejected rather than buffered
const MAX_PLAYLIST_BYTES: u64 = 64 * 1024 * 1024;

const LICENSE_KEY_PROP: &str = "inputstream.adaptive.license_key";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistEntry {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub tvg_logo: Option<String>,
    pub clear_key: Option<ClearKey>,
}

impl PlaylistEntry {
    pub fn into_channel(self) -> Channel {
        let (drm_key_id, drm_key) = match self.clear_key {
            Some(key) => (Some(key.key_id), Some(key.key)),
            None => (None, None),
        };
        Channel {
            name: self.name,
            logo: self.tvg_logo.filter(|l| !l.is_empty()),
            group: self.group.filter(|g| !g.is_empty()),
            manifest_uri: self.url,
            drm_key_id,
            drm_key,
        }
    }
}

/// Load a playlist from an HTTP(S) URL or a local file path
pub fn load_playlist(source: &str, user_agent: &str) -> Result<Vec<PlaylistEntry>, DirectoryError> {
    let source = source.trim();
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        download(source, user_agent)?
    } else {
        std::fs::read(source)?
    };
    let content = decode_body(bytes)?;
    Ok(parse_m3u(&content))
}

fn download(url: &str, user_agent: &str) -> Result<Vec<u8>, DirectoryError> {
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .timeout_connect(Some(Duration::from_secs(30)))
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = agent
        .get(url)
        .header("User-Agent", user_agent)
        .call()
        .map_err(|e| DirectoryError::Request(e.to_string()))?;

    if response.status() != 200 {
        return Err(DirectoryError::Status {
            status: response.status().as_u16(),
        });
    }

    response
        .body_mut()
        .with_config()
        .limit(MAX_PLAYLIST_BYTES)
        .read_to_vec()
        .map_err(|e| DirectoryError::Request(e.to_string()))
}

/// Turn a raw playlist body into text, inflating it first when it starts
/// with the gzip magic number (1f 8b).
pub fn decode_body(bytes: Vec<u8>) -> Result<String, DirectoryError> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut inflated = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut inflated)?;
        return Ok(String::from_utf8_lossy(&inflated).into_owned());
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse M3U content into playlist entries.
///
/// `#KODIPROP` clear-key annotations may appear anywhere between two URL
/// lines and attach to the entry that follows them.
pub fn parse_m3u(content: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut attrs: HashMap<String, String> = HashMap::new();
    let mut name: Option<String> = None;
    let mut pending_key: Option<ClearKey> = None;

    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');

        // Some providers drop the leading '#'
        let extinf = line
            .strip_prefix("#EXTINF:")
            .or_else(|| line.strip_prefix("EXTINF:"));

        if let Some(info) = extinf {
            attrs.clear();
            let (attr_part, title) = split_title(info);
            extract_attrs(attr_part, &mut attrs);
            name = Some(title.trim().to_string());
        } else if let Some(prop) = line.strip_prefix("#KODIPROP:") {
            if let Some((key, value)) = prop.split_once('=') {
                if key.trim().eq_ignore_ascii_case(LICENSE_KEY_PROP) {
                    pending_key = parse_license_key(value);
                }
            }
        } else if line.is_empty() || line.starts_with('#') {
            // #EXTM3U, #EXTVLCOPT, #EXTGRP and friends
            continue;
        } else if let Some(title) = name.take() {
            let title = if title.is_empty() {
                attrs.get("tvg-name").cloned().unwrap_or_default()
            } else {
                title
            };
            entries.push(PlaylistEntry {
                name: title,
                url: line.to_string(),
                group: attrs.get("group-title").cloned(),
                tvg_id: attrs.get("tvg-id").cloned(),
                tvg_name: attrs.get("tvg-name").cloned(),
                tvg_logo: attrs.get("tvg-logo").cloned(),
                clear_key: pending_key.take(),
            });
        } else {
            // URL without a preceding EXTINF
            pending_key = None;
        }
    }

    entries
}

/// `license_key=<kid>:<key>`. License server URLs and JSON key sets are
/// not clear-key pairs and yield `None`.
fn parse_license_key(value: &str) -> Option<ClearKey> {
    let value = value.trim();
    if value.contains("://") || value.starts_with('{') {
        return None;
    }
    let (kid, key) = value.split_once(':')?;
    let is_hex = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
    if !is_hex(kid.trim()) || !is_hex(key.trim()) {
        return None;
    }
    ClearKey::from_parts(Some(kid), Some(key))
}

/// Split an EXTINF body at the last comma outside quotes
fn split_title(info: &str) -> (&str, &str) {
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in info.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => split_at = Some(i),
            _ => {}
        }
    }
    // Unbalanced quotes: fall back to the last comma anywhere
    match split_at.or_else(|| info.rfind(',')) {
        Some(i) => (&info[..i], &info[i + 1..]),
        None => (info, ""),
    }
}

/// Collect `key="value"` and `key=value` pairs, skipping the leading duration
fn extract_attrs(attr_part: &str, attrs: &mut HashMap<String, String>) {
    let rest = attr_part.trim_start();
    let duration_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .unwrap_or(rest.len());
    let mut chars = rest[duration_end..].chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|&c| c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            // Bare token without a value
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        value.push('"');
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }

        // Tolerates stray quotes such as `"tvg-name="x"`
        let key = key.trim_matches('"').to_lowercase();
        if !key.is_empty() {
            attrs.insert(key, value);
        }
    }
}
