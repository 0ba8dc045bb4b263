//! Status vocabulary shared by the session and the views

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Accent,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Connecting,
    Advertisement,
    LoadingStream,
    NowPlaying { group: String },
    FailedToLoad,
    StreamOffline,
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Status::Idle => "",
            Status::Connecting => "Connecting...",
            Status::Advertisement => "Advertisement",
            Status::LoadingStream => "Loading Stream...",
            Status::NowPlaying { group } => group,
            Status::FailedToLoad => "Failed to Load",
            Status::StreamOffline => "Stream Offline",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Status::Idle => Tone::Neutral,
            Status::Connecting | Status::LoadingStream | Status::NowPlaying { .. } => Tone::Accent,
            Status::Advertisement => Tone::Warning,
            Status::FailedToLoad | Status::StreamOffline => Tone::Error,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Status::FailedToLoad | Status::StreamOffline)
    }
}

/// Which player surface is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Hidden,
    Full,
    Minimized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_and_tone() {
        let playing = Status::NowPlaying { group: "News".to_string() };
        assert_eq!(playing.text(), "News");
        assert_eq!(playing.tone(), Tone::Accent);
        assert_eq!(Status::Advertisement.tone(), Tone::Warning);
        assert_eq!(Status::FailedToLoad.text(), "Failed to Load");
        assert!(Status::StreamOffline.is_offline());
        assert!(!Status::LoadingStream.is_offline());
        assert_eq!(Status::Idle.text(), "");
    }
}
