//! Data models for the Litestream portal

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Group label shown for channels that carry no group
pub const DEFAULT_GROUP_LABEL: &str = "Live Stream";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").expect("valid regex"));
static HYPHEN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// UI Tab selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Channels,
    Console,
    Settings,
}

/// Clear-key pair as delivered in the portal's `ClearKey` object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearKeyFields {
    #[serde(default)]
    pub k1: Option<String>,
    #[serde(default)]
    pub k2: Option<String>,
}

/// Content decryption key mapping `{key_id: key}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearKey {
    pub key_id: String,
    pub key: String,
}

impl ClearKey {
    /// Pair up a key id and key, only when both are present and non-empty.
    pub fn from_parts(key_id: Option<&str>, key: Option<&str>) -> Option<Self> {
        let key_id = key_id.map(str::trim).filter(|s| !s.is_empty())?;
        let key = key.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            key_id: key_id.to_string(),
            key: key.to_string(),
        })
    }
}

/// Channel as listed by the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, rename = "manifestUri")]
    pub manifest_uri: String,
    #[serde(default, rename = "drmKeyId")]
    pub drm_key_id: Option<String>,
    #[serde(default, rename = "drmKey")]
    pub drm_key: Option<String>,
}

impl Channel {
    pub fn new(name: &str, manifest_uri: &str) -> Self {
        Self {
            name: name.to_string(),
            logo: None,
            group: None,
            manifest_uri: manifest_uri.to_string(),
            drm_key_id: None,
            drm_key: None,
        }
    }

    /// Identity key used by the channel list, analytics and deep links
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    pub fn group_label(&self) -> &str {
        self.group
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(DEFAULT_GROUP_LABEL)
    }

    pub fn clear_key(&self) -> Option<ClearKey> {
        ClearKey::from_parts(self.drm_key_id.as_deref(), self.drm_key.as_deref())
    }
}

/// Normalize a display name into a URL-safe slug.
///
/// Lowercases, replaces whitespace runs with `-`, strips everything outside
/// `[A-Za-z0-9_-]` and collapses repeated hyphens.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let hyphenated = WHITESPACE.replace_all(lowered.trim(), "-");
    let stripped = NON_WORD.replace_all(&hyphenated, "");
    HYPHEN_RUN.replace_all(&stripped, "-").into_owned()
}

/// Pre-roll advertisement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdSpot {
    #[serde(rename = "videoUrl")]
    pub video_uri: String,
    #[serde(default, rename = "linkUrl")]
    pub click_through_uri: Option<String>,
}

/// Secure playback data for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCredentials {
    #[serde(rename = "manifestUri")]
    pub manifest_uri: String,
    #[serde(default, rename = "ClearKey")]
    pub clear_key_fields: Option<ClearKeyFields>,
}

impl StreamCredentials {
    pub fn new(manifest_uri: &str, key: Option<ClearKey>) -> Self {
        Self {
            manifest_uri: manifest_uri.to_string(),
            clear_key_fields: key.map(|k| ClearKeyFields {
                k1: Some(k.key_id),
                k2: Some(k.key),
            }),
        }
    }

    /// Key pair to configure on the backend, if the channel is protected
    pub fn clear_key(&self) -> Option<ClearKey> {
        let fields = self.clear_key_fields.as_ref()?;
        ClearKey::from_parts(fields.k1.as_deref(), fields.k2.as_deref())
    }
}
