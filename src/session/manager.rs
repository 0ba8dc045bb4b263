//! Player/ad orchestration for "viewing a channel"
//!
//! A session moves through `AdPlaying -> StreamLoading -> Playing`, dropping to
//! `Offline` on failure. Suspended work runs through the `Dispatch` and comes
//! back as a `SessionEvent`; the generation it carries decides whether the
//! result still belongs to the current session.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use super::event::{AdOutcome, EventKind, Reporter, SessionEvent};
use super::status::Status;
use super::traits::{AdSource, CredentialSource, Dispatch, StreamBackend, ViewCounter, ViewSink};
use crate::error::{AdError, CredentialsError};
use crate::location::Location;
use crate::models::{AdSpot, Channel, StreamCredentials};

const DEFAULT_MINIMIZE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AdPlaying,
    StreamLoading,
    Playing,
    Offline,
    Closed,
}

/// Collaborators the session calls off the UI thread
#[derive(Clone)]
pub struct Services {
    /// `None` disables pre-roll ads entirely
    pub ads: Option<Arc<dyn AdSource>>,
    pub credentials: Arc<dyn CredentialSource>,
    pub counter: Option<Arc<dyn ViewCounter>>,
}

/// One "open channel" request
#[derive(Debug)]
pub struct PlaybackSession {
    channel: Channel,
    phase: Phase,
    generation: u64,
    ad: Option<AdSpot>,
    ad_outcome: Option<AdOutcome>,
}

impl PlaybackSession {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// How the ad break ended, once it has
    pub fn ad_outcome(&self) -> Option<&AdOutcome> {
        self.ad_outcome.as_ref()
    }

    fn close(mut self) {
        debug!(
            "Session {} for '{}' closed from {:?}",
            self.generation, self.channel.name, self.phase
        );
        self.phase = Phase::Closed;
    }
}

pub struct SessionManager<B, V> {
    backend: B,
    view: V,
    services: Services,
    dispatch: Box<dyn Dispatch>,
    events: Sender<SessionEvent>,
    generation: u64,
    current: Option<PlaybackSession>,
    offline: HashMap<String, bool>,
    location: Location,
    minimize_delay: Duration,
}

impl<B: StreamBackend, V: ViewSink> SessionManager<B, V> {
    pub fn new(
        backend: B,
        view: V,
        services: Services,
        dispatch: Box<dyn Dispatch>,
        events: Sender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            view,
            services,
            dispatch,
            events,
            generation: 0,
            current: None,
            offline: HashMap::new(),
            location: Location::default(),
            minimize_delay: DEFAULT_MINIMIZE_DELAY,
        }
    }

    pub fn with_minimize_delay(mut self, delay: Duration) -> Self {
        self.minimize_delay = delay;
        self
    }

    pub fn set_ads(&mut self, ads: Option<Arc<dyn AdSource>>) {
        self.services.ads = ads;
    }

    pub fn phase(&self) -> Phase {
        self.current.as_ref().map_or(Phase::Idle, |s| s.phase)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.current.as_ref().map(|s| &s.channel)
    }

    /// Sticky per-channel flag, kept across sessions until a later load succeeds
    pub fn is_offline(&self, slug: &str) -> bool {
        self.offline.get(slug).copied().unwrap_or(false)
    }

    /// True while the session waits on an ad or the stream
    pub fn is_busy(&self) -> bool {
        matches!(self.phase(), Phase::AdPlaying | Phase::StreamLoading)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Start viewing `channel`, superseding whatever session was current.
    pub fn open(&mut self, channel: Channel) {
        self.generation += 1;
        if let Some(previous) = self.current.take() {
            previous.close();
        }

        // The surface decodes one thing at a time
        self.backend.stop_ad();
        self.backend.unload();

        let slug = channel.slug();
        info!("Opening '{}' ({}) generation {}", channel.name, slug, self.generation);

        self.view.set_ad_controls(None);
        self.view.show_channel(&channel);
        self.view.open_full();
        self.view.set_status(&Status::Connecting);
        self.view.set_title(Some(&channel.name));
        self.location.push_channel(&slug);
        self.count_view(slug);

        self.current = Some(PlaybackSession {
            channel,
            phase: Phase::AdPlaying,
            generation: self.generation,
            ad: None,
            ad_outcome: None,
        });

        match self.services.ads.clone() {
            Some(ads) => {
                let reporter = self.reporter();
                self.dispatch.spawn(
                    "ads",
                    Box::new(move || reporter.report(EventKind::AdsFetched(ads.fetch()))),
                );
            }
            None => self.begin_stream(),
        }
    }

    /// Apply the result of suspended work. Results from a superseded
    /// generation are dropped without touching the view or the backend.
    pub fn handle(&mut self, event: SessionEvent) {
        if event.generation != self.generation {
            debug!(
                "Discarding stale {} from generation {} (current {})",
                event.kind.name(),
                event.generation,
                self.generation
            );
            return;
        }

        let phase = self.phase();
        match (phase, event.kind) {
            (Phase::AdPlaying, EventKind::AdsFetched(result)) => self.start_ad(result),
            (Phase::AdPlaying, EventKind::AdFinished(outcome)) => self.finish_ad(outcome),
            (Phase::StreamLoading, EventKind::CredentialsFetched(result)) => {
                self.load_stream(result)
            }
            (Phase::Playing, EventKind::PlaybackFailed(error)) => {
                self.mark_offline(Status::StreamOffline, &error.to_string())
            }
            (Phase::Playing, EventKind::PlaybackEnded) => {
                info!("Player window closed, ending the session");
                self.close()
            }
            (phase, kind) => debug!("Ignoring {} in {:?}", kind.name(), phase),
        }
    }

    /// User pressed "Skip Ad"
    pub fn skip_ad(&mut self) {
        self.finish_ad(AdOutcome::Skipped);
    }

    /// Link behind the ad currently on screen
    pub fn ad_click_through(&self) -> Option<String> {
        let session = self.current.as_ref()?;
        if session.phase != Phase::AdPlaying {
            return None;
        }
        session.ad.as_ref()?.click_through_uri.clone()
    }

    pub fn minimize(&mut self) {
        match self.phase() {
            Phase::Playing | Phase::Offline => self.view.minimize(self.minimize_delay),
            phase => debug!("Minimize ignored in {:?}", phase),
        }
    }

    pub fn restore(&mut self) {
        match self.phase() {
            Phase::Playing | Phase::Offline => self.view.restore(),
            phase => debug!("Restore ignored in {:?}", phase),
        }
    }

    /// Tear down whatever is playing and return to idle. Valid from any phase.
    pub fn close(&mut self) {
        self.generation += 1;
        if let Some(session) = self.current.take() {
            info!("Closing '{}'", session.channel.name);
            session.close();
        }

        self.backend.stop_ad();
        self.backend.unload();

        self.view.set_ad_controls(None);
        self.view.hide();
        self.view.set_status(&Status::Idle);
        self.view.set_title(None);
        self.location.restore();
    }

    fn reporter(&self) -> Reporter {
        Reporter::new(self.generation, self.events.clone())
    }

    fn count_view(&self, slug: String) {
        let Some(counter) = self.services.counter.clone() else {
            return;
        };
        self.dispatch.spawn(
            "views",
            Box::new(move || {
                if let Err(e) = counter.increment(&slug) {
                    debug!("View count for '{}' dropped: {}", slug, e);
                }
            }),
        );
    }

    fn start_ad(&mut self, result: Result<Vec<AdSpot>, AdError>) {
        let ads = match result {
            Ok(ads) => ads,
            Err(e) => return self.skip_ad_break(AdOutcome::Errored(e)),
        };
        let Some(ad) = ads.choose(&mut rand::thread_rng()).cloned() else {
            debug!("No ad inventory, going straight to the stream");
            return self.begin_stream();
        };

        let reporter = self.reporter();
        if let Err(e) = self.backend.play_ad(&ad, reporter) {
            return self.skip_ad_break(AdOutcome::Errored(AdError::Rejected(e.to_string())));
        }

        debug!("Playing ad {}", ad.video_uri);
        self.view.set_status(&Status::Advertisement);
        self.view.set_ad_controls(Some(&ad));
        if let Some(session) = self.current.as_mut() {
            session.ad = Some(ad);
        }
    }

    /// The ad never reached the screen
    fn skip_ad_break(&mut self, outcome: AdOutcome) {
        if let AdOutcome::Errored(e) = &outcome {
            warn!("Skipping ad: {}", e);
        }
        if let Some(session) = self.current.as_mut() {
            session.ad_outcome = Some(outcome);
        }
        self.begin_stream();
    }

    fn finish_ad(&mut self, outcome: AdOutcome) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.phase != Phase::AdPlaying || session.ad.take().is_none() {
            return;
        }

        match &outcome {
            AdOutcome::Errored(e) => warn!("Ad failed: {}", e),
            other => debug!("Ad finished: {:?}", other),
        }
        session.ad_outcome = Some(outcome);
        self.backend.stop_ad();
        self.view.set_ad_controls(None);
        self.begin_stream();
    }

    fn begin_stream(&mut self) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.phase = Phase::StreamLoading;
        let channel = session.channel.clone();

        self.view.set_ad_controls(None);
        self.view.set_status(&Status::LoadingStream);
        // Clear residual ad state from the surface before the stream
        self.backend.unload();

        let credentials = Arc::clone(&self.services.credentials);
        let reporter = self.reporter();
        self.dispatch.spawn(
            "credentials",
            Box::new(move || {
                reporter.report(EventKind::CredentialsFetched(credentials.fetch(&channel)))
            }),
        );
    }

    fn load_stream(&mut self, result: Result<StreamCredentials, CredentialsError>) {
        let credentials = match result {
            Ok(credentials) => credentials,
            Err(e) => return self.mark_offline(Status::FailedToLoad, &e.to_string()),
        };

        self.backend.configure_drm(credentials.clear_key());
        let reporter = self.reporter();
        if let Err(e) = self.backend.load(&credentials.manifest_uri, reporter) {
            return self.mark_offline(Status::FailedToLoad, &e.to_string());
        }
        if let Err(e) = self.backend.play() {
            warn!("Stream autoplay blocked: {}", e);
        }

        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.phase = Phase::Playing;
        let slug = session.channel.slug();
        let group = session.channel.group_label().to_string();
        info!("Now playing '{}'", session.channel.name);

        self.offline.insert(slug.clone(), false);
        self.view.set_offline(&slug, false);
        self.view.set_status(&Status::NowPlaying { group });
    }

    fn mark_offline(&mut self, status: Status, reason: &str) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.phase = Phase::Offline;
        let slug = session.channel.slug();
        warn!("'{}' is offline: {}", session.channel.name, reason);

        self.offline.insert(slug.clone(), true);
        self.view.set_offline(&slug, true);
        self.view.set_status(&status);
    }
}
