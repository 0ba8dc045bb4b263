//! Recording doubles for every session collaborator

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;

use super::event::Reporter;
use super::status::{Layout, Status};
use super::traits::{AdSource, CredentialSource, Dispatch, StreamBackend, ViewCounter, ViewSink};
use crate::error::{AdError, AnalyticsError, BackendError, CredentialsError};
use crate::models::{AdSpot, Channel, ClearKey, StreamCredentials};

type Job = Box<dyn FnOnce() + Send>;

/// Shared handle on jobs queued by `ManualDispatch`
#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Rc<RefCell<VecDeque<(String, Job)>>>,
}

impl JobQueue {
    pub fn names(&self) -> Vec<String> {
        self.jobs.borrow().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Run every queued job, oldest first. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let jobs: Vec<_> = self.jobs.borrow_mut().drain(..).collect();
        let count = jobs.len();
        for (_, job) in jobs {
            job();
        }
        count
    }

    /// Run only the most recently queued job
    pub fn run_last(&self) -> bool {
        let job = self.jobs.borrow_mut().pop_back();
        match job {
            Some((_, job)) => {
                job();
                true
            }
            None => false,
        }
    }
}

pub struct ManualDispatch {
    queue: JobQueue,
}

impl ManualDispatch {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }
}

impl Dispatch for ManualDispatch {
    fn spawn(&self, name: &str, job: Job) {
        self.queue.jobs.borrow_mut().push_back((name.to_string(), job));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    ConfigureDrm(Option<ClearKey>),
    Load(String),
    Play,
    Unload,
    PlayAd(String),
    StopAd,
}

#[derive(Default)]
pub struct MockBackend {
    pub calls: Vec<BackendCall>,
    pub reject_ad: bool,
    pub fail_load: bool,
    pub fail_play: bool,
    pub ad_reporter: Option<Reporter>,
    pub stream_reporter: Option<Reporter>,
}

impl MockBackend {
    pub fn loads(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::Load(uri) => Some(uri.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn drm_configs(&self) -> Vec<Option<ClearKey>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::ConfigureDrm(key) => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ads_played(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, BackendCall::PlayAd(_)))
            .count()
    }
}

impl StreamBackend for MockBackend {
    fn configure_drm(&mut self, key: Option<ClearKey>) {
        self.calls.push(BackendCall::ConfigureDrm(key));
    }

    fn load(&mut self, manifest_uri: &str, reporter: Reporter) -> Result<(), BackendError> {
        self.calls.push(BackendCall::Load(manifest_uri.to_string()));
        if self.fail_load {
            return Err(BackendError::Exited { code: Some(1) });
        }
        self.stream_reporter = Some(reporter);
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.calls.push(BackendCall::Play);
        if self.fail_play {
            return Err(BackendError::Monitor("autoplay blocked".to_string()));
        }
        Ok(())
    }

    fn unload(&mut self) {
        self.calls.push(BackendCall::Unload);
        self.stream_reporter = None;
    }

    fn play_ad(&mut self, ad: &AdSpot, reporter: Reporter) -> Result<(), BackendError> {
        self.calls.push(BackendCall::PlayAd(ad.video_uri.clone()));
        if self.reject_ad {
            return Err(BackendError::Spawn {
                player: "mock".to_string(),
                reason: "autoplay blocked".to_string(),
            });
        }
        self.ad_reporter = Some(reporter);
        Ok(())
    }

    fn stop_ad(&mut self) {
        self.calls.push(BackendCall::StopAd);
    }
}

/// Keeps the latest state of each surface plus the full status history
pub struct RecordingView {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub statuses: Vec<Status>,
    pub offline: HashMap<String, bool>,
    pub ad_controls: Option<AdSpot>,
    pub ad_controls_shown: usize,
    pub layout: Layout,
    pub minimize_delay: Option<Duration>,
    pub title: Option<String>,
}

impl Default for RecordingView {
    fn default() -> Self {
        Self {
            name: None,
            logo: None,
            statuses: Vec::new(),
            offline: HashMap::new(),
            ad_controls: None,
            ad_controls_shown: 0,
            layout: Layout::Hidden,
            minimize_delay: None,
            title: None,
        }
    }
}

impl RecordingView {
    pub fn status(&self) -> Option<&Status> {
        self.statuses.last()
    }
}

impl ViewSink for RecordingView {
    fn show_channel(&mut self, channel: &Channel) {
        self.name = Some(channel.name.clone());
        self.logo = channel.logo.clone();
    }

    fn set_status(&mut self, status: &Status) {
        self.statuses.push(status.clone());
    }

    fn set_offline(&mut self, slug: &str, offline: bool) {
        self.offline.insert(slug.to_string(), offline);
    }

    fn set_ad_controls(&mut self, ad: Option<&AdSpot>) {
        if ad.is_some() {
            self.ad_controls_shown += 1;
        }
        self.ad_controls = ad.cloned();
    }

    fn open_full(&mut self) {
        self.layout = Layout::Full;
    }

    fn minimize(&mut self, delay: Duration) {
        self.minimize_delay = Some(delay);
        self.layout = Layout::Minimized;
    }

    fn restore(&mut self) {
        self.layout = Layout::Full;
    }

    fn hide(&mut self) {
        self.layout = Layout::Hidden;
    }

    fn set_title(&mut self, title: Option<&str>) {
        self.title = title.map(str::to_string);
    }
}

pub struct StaticAds(pub Result<Vec<AdSpot>, AdError>);

impl StaticAds {
    pub fn none() -> Self {
        Self(Ok(Vec::new()))
    }

    pub fn one(video_uri: &str, link: Option<&str>) -> Self {
        Self(Ok(vec![AdSpot {
            video_uri: video_uri.to_string(),
            click_through_uri: link.map(str::to_string),
        }]))
    }
}

impl AdSource for StaticAds {
    fn fetch(&self) -> Result<Vec<AdSpot>, AdError> {
        self.0.clone()
    }
}

/// Credentials keyed by channel name; unknown channels are not found
#[derive(Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Result<StreamCredentials, CredentialsError>>,
}

impl StaticCredentials {
    pub fn with(mut self, name: &str, result: Result<StreamCredentials, CredentialsError>) -> Self {
        self.entries.insert(name.to_string(), result);
        self
    }

    pub fn serving(mut self, name: &str, manifest_uri: &str) -> Self {
        self.entries
            .insert(name.to_string(), Ok(StreamCredentials::new(manifest_uri, None)));
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn fetch(&self, channel: &Channel) -> Result<StreamCredentials, CredentialsError> {
        self.entries.get(&channel.name).cloned().unwrap_or_else(|| {
            Err(CredentialsError::NotFound {
                channel: channel.name.clone(),
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingCounter {
    pub slugs: Mutex<Vec<String>>,
    pub fail: bool,
}

impl ViewCounter for RecordingCounter {
    fn increment(&self, slug: &str) -> Result<(), AnalyticsError> {
        self.slugs.lock().unwrap().push(slug.to_string());
        if self.fail {
            return Err(AnalyticsError::Status { status: 500 });
        }
        Ok(())
    }
}
