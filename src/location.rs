//! Shareable location of the portal view (`/home?channel=<slug>`)

use std::fmt;
use url::Url;

pub const BASE_PATH: &str = "/home";
pub const APP_TITLE: &str = "Litestream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base_path: String,
    channel: Option<String>,
    prior: Option<Option<String>>,
}

impl Default for Location {
    fn default() -> Self {
        Self::new(BASE_PATH)
    }
}

impl Location {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            channel: None,
            prior: None,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Point the location at a channel. The location before the first push is
    /// kept so `restore` can return to it.
    pub fn push_channel(&mut self, slug: &str) {
        if self.prior.is_none() {
            self.prior = Some(self.channel.take());
        }
        self.channel = Some(slug.to_string());
    }

    pub fn restore(&mut self) {
        self.channel = self.prior.take().flatten();
    }

    /// Extract the channel slug from a shared link.
    ///
    /// Accepts a full URL (`https://host/home?channel=abc`), a path with a
    /// query (`/home?channel=abc`) or a bare query (`?channel=abc`).
    pub fn parse_deep_link(link: &str) -> Option<String> {
        let link = link.trim();
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => Url::parse("http://localhost/").ok()?.join(link).ok()?,
        };
        url.query_pairs()
            .find(|(key, _)| key == "channel")
            .map(|(_, value)| value.trim().to_string())
            .filter(|slug| !slug.is_empty())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel {
            Some(slug) => write!(f, "{}?channel={}", self.base_path, slug),
            None => f.write_str(&self.base_path),
        }
    }
}

/// Window title for an open channel, or the default title
pub fn window_title(channel_name: Option<&str>) -> String {
    match channel_name {
        Some(name) => format!("{} - {}", name, APP_TITLE),
        None => APP_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_restore() {
        let mut location = Location::default();
        assert_eq!(location.to_string(), "/home");

        location.push_channel("channel-a");
        assert_eq!(location.to_string(), "/home?channel=channel-a");

        // Switching channels keeps the original prior location
        location.push_channel("channel-b");
        assert_eq!(location.channel(), Some("channel-b"));

        location.restore();
        assert_eq!(location.to_string(), "/home");
    }

    #[test]
    fn test_deep_linked_open_restores_to_base() {
        let slug = Location::parse_deep_link("https://tv.example.com/home?channel=tv5").unwrap();
        let mut location = Location::default();
        location.push_channel(&slug);
        assert_eq!(location.to_string(), "/home?channel=tv5");

        location.push_channel("gma");
        location.restore();
        assert_eq!(location.channel(), None);

        // A second round starts from the restored base again
        location.push_channel("tv5");
        location.restore();
        assert_eq!(location.to_string(), "/home");
    }

    #[test]
    fn test_parse_deep_link() {
        assert_eq!(
            Location::parse_deep_link("https://tv.example.com/home?channel=nba-tv-philippines"),
            Some("nba-tv-philippines".to_string())
        );
        assert_eq!(Location::parse_deep_link("/home?channel=tv5&x=1"), Some("tv5".to_string()));
        assert_eq!(Location::parse_deep_link("?channel=gma"), Some("gma".to_string()));
        assert_eq!(Location::parse_deep_link("/home"), None);
        assert_eq!(Location::parse_deep_link("?channel="), None);
    }

    #[test]
    fn test_window_title() {
        assert_eq!(window_title(Some("TV5")), "TV5 - Litestream");
        assert_eq!(window_title(None), "Litestream");
    }
}
