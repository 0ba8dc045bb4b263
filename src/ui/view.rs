//! Player surfaces shown by the desktop shell
//!
//! The full player, the minimized bar and the channel-list icons all read
//! from this one struct, so they never disagree about the session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::{AdSpot, Channel};
use crate::session::{Layout, Status, ViewSink};

/// Status icon next to a channel in the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListIcon {
    Idle,
    Current,
    Offline,
}

/// What a player surface shows: channel name, logo and status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCard {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub status: Status,
}

#[derive(Debug)]
pub struct PortalView {
    name: Option<String>,
    logo: Option<String>,
    status: Status,
    offline: HashMap<String, bool>,
    ad: Option<AdSpot>,
    layout: Layout,
    minimize_at: Option<Instant>,
    title: Option<String>,
    title_changed: bool,
}

impl Default for PortalView {
    fn default() -> Self {
        Self {
            name: None,
            logo: None,
            status: Status::Idle,
            offline: HashMap::new(),
            ad: None,
            layout: Layout::Hidden,
            minimize_at: None,
            title: None,
            title_changed: false,
        }
    }
}

impl PortalView {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Content of the full player
    pub fn card(&self) -> PlayerCard {
        PlayerCard {
            name: self.name.clone(),
            logo: self.logo.clone(),
            status: self.status.clone(),
        }
    }

    /// Content of the minimized bar, while it is on screen
    pub fn mini_player(&self) -> Option<PlayerCard> {
        (self.layout == Layout::Minimized).then(|| self.card())
    }

    pub fn ad_controls(&self) -> Option<&AdSpot> {
        self.ad.as_ref()
    }

    pub fn is_offline(&self, slug: &str) -> bool {
        self.offline.get(slug).copied().unwrap_or(false)
    }

    pub fn list_icon(&self, channel: &Channel, current_slug: Option<&str>) -> ListIcon {
        let slug = channel.slug();
        if self.is_offline(&slug) {
            ListIcon::Offline
        } else if current_slug == Some(slug.as_str()) {
            ListIcon::Current
        } else {
            ListIcon::Idle
        }
    }

    /// True while a minimize transition is waiting for its deadline
    pub fn minimize_pending(&self) -> bool {
        self.minimize_at.is_some()
    }

    /// Apply a due minimize. Called once per frame.
    pub fn tick(&mut self, now: Instant) {
        if let Some(at) = self.minimize_at {
            if now >= at {
                self.minimize_at = None;
                self.layout = Layout::Minimized;
            }
        }
    }

    /// The new window title, once per change
    pub fn take_title_change(&mut self) -> Option<Option<String>> {
        if !self.title_changed {
            return None;
        }
        self.title_changed = false;
        Some(self.title.clone())
    }
}

impl ViewSink for PortalView {
    fn show_channel(&mut self, channel: &Channel) {
        self.name = Some(channel.name.clone());
        self.logo = channel.logo.clone();
    }

    fn set_status(&mut self, status: &Status) {
        self.status = status.clone();
    }

    fn set_offline(&mut self, slug: &str, offline: bool) {
        self.offline.insert(slug.to_string(), offline);
    }

    fn set_ad_controls(&mut self, ad: Option<&AdSpot>) {
        self.ad = ad.cloned();
    }

    fn open_full(&mut self) {
        self.minimize_at = None;
        self.layout = Layout::Full;
    }

    fn minimize(&mut self, delay: Duration) {
        self.minimize_at = Some(Instant::now() + delay);
    }

    fn restore(&mut self) {
        self.minimize_at = None;
        self.layout = Layout::Full;
    }

    fn hide(&mut self) {
        self.minimize_at = None;
        self.layout = Layout::Hidden;
        self.name = None;
        self.logo = None;
    }

    fn set_title(&mut self, title: Option<&str>) {
        let title = title.map(str::to_string);
        if title != self.title {
            self.title = title;
            self.title_changed = true;
        }
    }
}
