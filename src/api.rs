//! Portal HTTP client
//!
//! The portal's serverless handlers reject requests whose `Referer` is not
//! the portal itself, so every call carries the portal origin.

use log::debug;
use std::time::Duration;
use url::Url;

use crate::error::{AdError, AnalyticsError, CredentialsError, DirectoryError};
use crate::models::{AdSpot, Channel, StreamCredentials};
use crate::session::{AdSource, ChannelDirectory, CredentialSource, TopWatchedSource, ViewCounter};

const GET_CHANNELS: &str = "/api/getChannels";
const GET_ADS: &str = "/api/getAds";
const GET_DATA: &str = "/api/getData";
const INCREMENT_VIEW: &str = "/api/incrementView";
const GET_TOP_CHANNELS: &str = "/api/getTopChannels";

pub struct PortalClient {
    base: Url,
    referer: String,
    user_agent: String,
    agent: ureq::Agent,
}

impl PortalClient {
    pub fn new(portal_url: &str, user_agent: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(portal_url.trim())?;
        let referer = format!("{}/", base.origin().ascii_serialization());
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .timeout_connect(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Ok(Self {
            base,
            referer,
            user_agent: user_agent.to_string(),
            agent,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a portal-relative path (as used by ad clips) to an absolute URL
    pub fn resolve(&self, uri: &str) -> String {
        match self.base.join(uri) {
            Ok(url) => url.to_string(),
            Err(_) => uri.to_string(),
        }
    }

    /// GET `path`, returning the status and body text. Only transport
    /// failures are errors here; status handling is left to each endpoint.
    fn get(&self, path: &str, query: Option<(&str, &str)>) -> Result<(u16, String), String> {
        let url = self.base.join(path).map_err(|e| e.to_string())?;
        let mut request = self
            .agent
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .header("Referer", &self.referer)
            .header("Accept", "application/json");
        if let Some((key, value)) = query {
            request = request.query(key, value);
        }

        let mut response = request.call().map_err(|e| format!("Request failed: {}", e))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| format!("Read failed: {}", e))?;
        debug!("GET {} -> {}", path, status);
        Ok((status, body))
    }
}

impl ChannelDirectory for PortalClient {
    fn list(&self) -> Result<Vec<Channel>, DirectoryError> {
        let (status, body) = self.get(GET_CHANNELS, None).map_err(DirectoryError::Request)?;
        if status != 200 {
            return Err(DirectoryError::Status { status });
        }
        let channels: Vec<Channel> = serde_json::from_str(&body)?;
        if channels.is_empty() {
            return Err(DirectoryError::Empty);
        }
        Ok(channels)
    }
}

impl AdSource for PortalClient {
    fn fetch(&self) -> Result<Vec<AdSpot>, AdError> {
        let (status, body) = self.get(GET_ADS, None).map_err(AdError::Unavailable)?;
        if status != 200 {
            return Err(AdError::Unavailable(format!("HTTP error: {}", status)));
        }
        let ads: Vec<AdSpot> =
            serde_json::from_str(&body).map_err(|e| AdError::Unavailable(e.to_string()))?;

        Ok(ads
            .into_iter()
            .filter(|ad| !ad.video_uri.trim().is_empty())
            .map(|ad| AdSpot {
                video_uri: self.resolve(&ad.video_uri),
                click_through_uri: ad
                    .click_through_uri
                    .filter(|link| !link.trim().is_empty())
                    .map(|link| self.resolve(&link)),
            })
            .collect())
    }
}

impl CredentialSource for PortalClient {
    fn fetch(&self, channel: &Channel) -> Result<StreamCredentials, CredentialsError> {
        let (status, body) = self
            .get(GET_DATA, Some(("channel", &channel.name)))
            .map_err(CredentialsError::Network)?;

        match status {
            200 => {}
            404 => {
                return Err(CredentialsError::NotFound {
                    channel: channel.name.clone(),
                })
            }
            400 | 403 => {
                return Err(CredentialsError::AccessDenied {
                    channel: channel.name.clone(),
                })
            }
            other => return Err(CredentialsError::Network(format!("HTTP error: {}", other))),
        }

        let credentials: StreamCredentials = serde_json::from_str(&body)
            .map_err(|e| CredentialsError::InvalidResponse(e.to_string()))?;
        if credentials.manifest_uri.trim().is_empty() {
            return Err(CredentialsError::InvalidResponse(
                "missing manifestUri".to_string(),
            ));
        }
        Ok(credentials)
    }
}

impl ViewCounter for PortalClient {
    fn increment(&self, slug: &str) -> Result<(), AnalyticsError> {
        let (status, _) = self
            .get(INCREMENT_VIEW, Some(("channel", slug)))
            .map_err(AnalyticsError::Request)?;
        if !(200..300).contains(&status) {
            return Err(AnalyticsError::Status { status });
        }
        Ok(())
    }
}

impl TopWatchedSource for PortalClient {
    fn top(&self, n: usize) -> Result<Vec<String>, AnalyticsError> {
        let (status, body) = self
            .get(GET_TOP_CHANNELS, None)
            .map_err(AnalyticsError::Request)?;
        if status != 200 {
            return Err(AnalyticsError::Status { status });
        }
        let mut slugs: Vec<String> = serde_json::from_str(&body)?;
        slugs.truncate(n);
        Ok(slugs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_is_portal_origin() {
        let client = PortalClient::new("https://tv.example.com/home?channel=x", "test").unwrap();
        assert_eq!(client.referer, "https://tv.example.com/");
    }

    #[test]
    fn test_resolve_relative_ad_paths() {
        let client = PortalClient::new("https://tv.example.com/home", "test").unwrap();
        assert_eq!(
            client.resolve("/assets/ads/1.mp4"),
            "https://tv.example.com/assets/ads/1.mp4"
        );
        assert_eq!(client.resolve("https://dito.ph/"), "https://dito.ph/");
    }

    #[test]
    fn test_invalid_portal_url() {
        assert!(PortalClient::new("not a url", "test").is_err());
    }

    #[test]
    fn test_unreachable_portal_degrades_per_endpoint() {
        // Port 9 (discard) on localhost refuses connections
        let client = PortalClient::new("http://127.0.0.1:9", "test").unwrap();
        assert!(matches!(AdSource::fetch(&client), Err(AdError::Unavailable(_))));
        assert!(matches!(
            CredentialSource::fetch(&client, &Channel::new("TV5", "")),
            Err(CredentialsError::Network(_))
        ));
        assert!(matches!(client.increment("tv5"), Err(AnalyticsError::Request(_))));
        assert!(matches!(client.list(), Err(DirectoryError::Request(_))));
    }
}
