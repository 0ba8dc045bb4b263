//! Results of suspended session work, tagged with the generation that asked for them

use std::sync::mpsc::Sender;

use crate::error::{AdError, BackendError, CredentialsError};
use crate::models::{AdSpot, StreamCredentials};

/// How an ad break ended. Every variant proceeds to the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AdOutcome {
    Ended,
    Skipped,
    Errored(AdError),
}

#[derive(Debug)]
pub enum EventKind {
    AdsFetched(Result<Vec<AdSpot>, AdError>),
    AdFinished(AdOutcome),
    CredentialsFetched(Result<StreamCredentials, CredentialsError>),
    PlaybackFailed(BackendError),
    /// The player was closed normally, e.g. by closing its window
    PlaybackEnded,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::AdsFetched(_) => "ad list",
            EventKind::AdFinished(_) => "ad outcome",
            EventKind::CredentialsFetched(_) => "channel credentials",
            EventKind::PlaybackFailed(_) => "playback error",
            EventKind::PlaybackEnded => "playback end",
        }
    }
}

#[derive(Debug)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: EventKind,
}

/// Delivery handle bound to one generation.
///
/// Handed to workers and to the backend for the lifetime of a request; the
/// session ignores anything it sends once a newer `open` or a `close` happened.
#[derive(Debug, Clone)]
pub struct Reporter {
    generation: u64,
    sender: Sender<SessionEvent>,
}

impl Reporter {
    pub fn new(generation: u64, sender: Sender<SessionEvent>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn report(&self, kind: EventKind) {
        // The receiver only goes away when the app shuts down
        let _ = self.sender.send(SessionEvent {
            generation: self.generation,
            kind,
        });
    }
}
