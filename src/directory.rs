//! Channel listing from M3U playlists, plus search and paging over the list

use log::info;

use crate::error::{CredentialsError, DirectoryError};
use crate::m3u_parser::{self, PlaylistEntry};
use crate::models::{Channel, StreamCredentials};
use crate::session::{ChannelDirectory, CredentialSource};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Directory backed by an M3U playlist URL or local file
pub struct PlaylistDirectory {
    source: String,
    user_agent: String,
}

impl PlaylistDirectory {
    pub fn new(source: &str, user_agent: &str) -> Self {
        Self {
            source: source.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

impl ChannelDirectory for PlaylistDirectory {
    fn list(&self) -> Result<Vec<Channel>, DirectoryError> {
        let entries = m3u_parser::load_playlist(&self.source, &self.user_agent)?;
        if entries.is_empty() {
            return Err(DirectoryError::Empty);
        }
        info!("Loaded {} channels from {}", entries.len(), self.source);
        Ok(entries.into_iter().map(PlaylistEntry::into_channel).collect())
    }
}

/// Serves each channel's own manifest and key, for playlist sources where
/// the listing already carries everything needed to play.
#[derive(Debug, Default, Clone)]
pub struct PlaylistCredentials;

impl CredentialSource for PlaylistCredentials {
    fn fetch(&self, channel: &Channel) -> Result<StreamCredentials, CredentialsError> {
        if channel.manifest_uri.trim().is_empty() {
            return Err(CredentialsError::NotFound {
                channel: channel.name.clone(),
            });
        }
        Ok(StreamCredentials::new(&channel.manifest_uri, channel.clear_key()))
    }
}

/// Case-insensitive substring check without allocation
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    if !needle.is_ascii() {
        return haystack.to_lowercase().contains(&needle.to_lowercase());
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Channels whose name or group contains `query`, in listing order
pub fn search<'a>(channels: &'a [Channel], query: &str) -> Vec<&'a Channel> {
    let query = query.trim();
    channels
        .iter()
        .filter(|c| {
            contains_ignore_case(&c.name, query)
                || c.group.as_deref().is_some_and(|g| contains_ignore_case(g, query))
        })
        .collect()
}

pub fn find_by_slug<'a>(channels: &'a [Channel], slug: &str) -> Option<&'a Channel> {
    channels.iter().find(|c| c.slug() == slug)
}

/// "Load more" paging: how many items of the current result set are shown
#[derive(Debug, Clone, PartialEq)]
pub struct Pager {
    page_size: usize,
    pages: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            pages: 1,
        }
    }

    pub fn visible(&self, total: usize) -> usize {
        total.min(self.page_size * self.pages)
    }

    pub fn has_more(&self, total: usize) -> bool {
        self.visible(total) < total
    }

    pub fn load_more(&mut self) {
        self.pages += 1;
    }

    /// Back to the first page, e.g. when the search query changes
    pub fn reset(&mut self) {
        self.pages = 1;
    }
}
