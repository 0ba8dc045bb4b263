//! Playback session: pre-roll ad, stream load and status reporting for one channel

mod dispatch;
mod event;
mod manager;
mod status;
mod traits;

#[cfg(test)]
pub mod mock;

pub use dispatch::ThreadDispatch;
pub use event::{AdOutcome, EventKind, Reporter, SessionEvent};
pub use manager::{PlaybackSession, Phase, Services, SessionManager};
pub use status::{Layout, Status, Tone};
pub use traits::{
    AdSource, ChannelDirectory, CredentialSource, Dispatch, StreamBackend, TopWatchedSource,
    ViewCounter, ViewSink,
};
