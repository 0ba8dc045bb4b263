//! Collaborators consumed by the playback session

use std::time::Duration;

use super::event::Reporter;
use super::status::Status;
use crate::error::{AdError, AnalyticsError, BackendError, CredentialsError, DirectoryError};
use crate::models::{AdSpot, Channel, ClearKey, StreamCredentials};

pub trait ChannelDirectory: Send + Sync {
    fn list(&self) -> Result<Vec<Channel>, DirectoryError>;
}

/// Source of the pre-roll playlist. An empty list means no ad this time.
pub trait AdSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<AdSpot>, AdError>;
}

pub trait CredentialSource: Send + Sync {
    fn fetch(&self, channel: &Channel) -> Result<StreamCredentials, CredentialsError>;
}

/// Fire-and-forget view counting keyed by channel slug
pub trait ViewCounter: Send + Sync {
    fn increment(&self, slug: &str) -> Result<(), AnalyticsError>;
}

/// Channel slugs ranked by descending view count
pub trait TopWatchedSource: Send + Sync {
    fn top(&self, n: usize) -> Result<Vec<String>, AnalyticsError>;
}

/// Adaptive-streaming engine bound to the single video surface.
///
/// Ad clips and live streams share the surface; `unload` resets it. Anything
/// that happens after a call returns (ad ended, playback died) is delivered
/// through the `Reporter` handed in with the request.
pub trait StreamBackend {
    /// `None` clears any previously configured decryption keys.
    fn configure_drm(&mut self, key: Option<ClearKey>);
    fn load(&mut self, manifest_uri: &str, reporter: Reporter) -> Result<(), BackendError>;
    fn play(&mut self) -> Result<(), BackendError>;
    fn unload(&mut self);
    /// Start an ad clip. An error is the autoplay-rejection case.
    fn play_ad(&mut self, ad: &AdSpot, reporter: Reporter) -> Result<(), BackendError>;
    fn stop_ad(&mut self);
}

/// The three surfaces showing the session: full player, minimized player and
/// the channel-list status icon. Implementations keep them in sync.
pub trait ViewSink {
    fn show_channel(&mut self, channel: &Channel);
    fn set_status(&mut self, status: &Status);
    fn set_offline(&mut self, slug: &str, offline: bool);
    /// `Some` shows skip/visit controls for the ad, `None` hides them.
    fn set_ad_controls(&mut self, ad: Option<&AdSpot>);
    fn open_full(&mut self);
    /// Switch to the minimized player once `delay` has elapsed.
    fn minimize(&mut self, delay: Duration);
    fn restore(&mut self);
    fn hide(&mut self);
    fn set_title(&mut self, title: Option<&str>);
}

/// Runs blocking collaborator calls off the UI thread.
pub trait Dispatch {
    fn spawn(&self, name: &str, job: Box<dyn FnOnce() + Send>);
}
