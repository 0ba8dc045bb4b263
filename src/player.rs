//! External player backend: ffplay, mpv, vlc or any other command

use log::{debug, info, warn};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{AdError, BackendError};
use crate::location::APP_TITLE;
use crate::models::{AdSpot, ClearKey};
use crate::session::{AdOutcome, EventKind, Reporter, StreamBackend};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch settings shared by every player process
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub command: String,
    /// Buffering goal derived from the connection quality
    pub buffer_seconds: u32,
    pub slow_connection: bool,
    /// Relaunches of a live stream that died before it is reported offline
    pub retry_attempts: u32,
    pub hw_accel: bool,
    pub user_agent: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: "ffplay".to_string(),
            buffer_seconds: 5,
            slow_connection: false,
            retry_attempts: 3,
            hw_accel: true,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Ffplay,
    Mpv,
    Vlc,
    Generic,
}

impl PlayerKind {
    pub fn detect(command: &str) -> Self {
        let lower = command.to_lowercase();
        if lower.contains("ffplay") {
            PlayerKind::Ffplay
        } else if lower.contains("mpv") {
            PlayerKind::Mpv
        } else if lower.contains("vlc") {
            PlayerKind::Vlc
        } else {
            PlayerKind::Generic
        }
    }

    /// Players that can take a CENC key through the lavf demuxer
    pub fn supports_clear_key(self) -> bool {
        matches!(self, PlayerKind::Ffplay | PlayerKind::Mpv)
    }
}

fn stream_title(uri: &str) -> String {
    let stream_name = uri
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("stream");
    format!("{} - {}", APP_TITLE, stream_name)
}

/// Arguments for a live stream, tuned by the configured buffering goal
pub fn stream_args(config: &PlayerConfig, kind: PlayerKind, uri: &str, key: Option<&ClearKey>) -> Vec<String> {
    let buffer_secs = config.buffer_seconds;
    let buffer_ms = buffer_secs as i64 * 1000;
    // ~1MB per second, larger for probing
    let probe_bytes = buffer_secs as i64 * 1024 * 1024 * 4;
    let is_slow = config.slow_connection;
    let title = stream_title(uri);

    match kind {
        PlayerKind::Ffplay => {
            let mut args = vec![
                uri.to_string(),
                "-probesize".to_string(),
                probe_bytes.to_string(),
                "-analyzeduration".to_string(),
                (buffer_ms * 2000).to_string(),
                "-sync".to_string(),
                "audio".to_string(),
                "-framedrop".to_string(),
                "-window_title".to_string(),
                title,
            ];
            if uri.starts_with("http") {
                args.extend([
                    "-reconnect".to_string(),
                    "1".to_string(),
                    "-reconnect_streamed".to_string(),
                    "1".to_string(),
                    "-reconnect_delay_max".to_string(),
                    if is_slow { "30" } else { "10" }.to_string(),
                ]);
            }
            if is_slow {
                args.push("-infbuf".to_string());
            }
            if let Some(key) = key {
                args.extend(["-decryption_key".to_string(), key.key.clone()]);
            }
            if let Some(agent) = &config.user_agent {
                args.extend(["-user_agent".to_string(), agent.clone()]);
            }
            if config.hw_accel {
                // Windows: skipped, renders black with the Vulkan renderer
                #[cfg(target_os = "macos")]
                {
                    args.insert(0, "videotoolbox".to_string());
                    args.insert(0, "-hwaccel".to_string());
                }
                #[cfg(target_os = "linux")]
                {
                    args.insert(0, "auto".to_string());
                    args.insert(0, "-hwaccel".to_string());
                }
            }
            args
        }
        PlayerKind::Mpv => {
            let cache_secs = buffer_secs * 2;
            let cache_mb = buffer_secs * 4;
            let mut args = vec![
                uri.to_string(),
                format!("--title={}", title),
                "--cache=yes".to_string(),
                format!("--cache-secs={}", cache_secs),
                format!("--demuxer-readahead-secs={}", cache_secs),
                format!("--demuxer-max-bytes={}M", cache_mb),
                "--cache-pause=yes".to_string(),
                format!("--cache-pause-wait={}", buffer_secs),
                format!("--network-timeout={}", if is_slow { 120 } else { 60 }),
                "--stream-lavf-o=reconnect=1".to_string(),
                "--stream-lavf-o-append=reconnect_streamed=1".to_string(),
                format!("--demuxer-lavf-probesize={}", probe_bytes),
                "--demuxer-lavf-o=fflags=+genpts+discardcorrupt".to_string(),
                "--video-sync=audio".to_string(),
                "--ytdl=no".to_string(),
            ];
            if let Some(key) = key {
                args.push(format!("--demuxer-lavf-o-append=decryption_key={}", key.key));
            }
            args.push(if config.hw_accel { "--hwdec=auto-safe" } else { "--hwdec=no" }.to_string());
            if let Some(agent) = &config.user_agent {
                args.push(format!("--user-agent={}", agent));
            }
            args.push(if is_slow { "--framedrop=vo" } else { "--framedrop=no" }.to_string());
            args
        }
        PlayerKind::Vlc => {
            let cache_ms = buffer_ms * 2;
            let mut args = vec![
                uri.to_string(),
                format!("--meta-title={}", title),
                format!("--network-caching={}", cache_ms),
                format!("--live-caching={}", cache_ms),
                "--http-reconnect".to_string(),
            ];
            if config.hw_accel {
                args.push("--avcodec-hw=any".to_string());
            }
            if let Some(agent) = &config.user_agent {
                args.push(format!("--http-user-agent={}", agent));
            }
            args
        }
        PlayerKind::Generic => vec![uri.to_string()],
    }
}

/// Arguments for an ad clip. The process must exit when the clip ends.
pub fn ad_args(config: &PlayerConfig, kind: PlayerKind, uri: &str) -> Vec<String> {
    let title = format!("{} - Advertisement", APP_TITLE);
    let mut args = match kind {
        PlayerKind::Ffplay => vec![
            uri.to_string(),
            "-autoexit".to_string(),
            "-window_title".to_string(),
            title,
        ],
        PlayerKind::Mpv => vec![
            uri.to_string(),
            format!("--title={}", title),
            "--keep-open=no".to_string(),
            "--force-window=immediate".to_string(),
        ],
        PlayerKind::Vlc => vec![
            uri.to_string(),
            format!("--meta-title={}", title),
            "--play-and-exit".to_string(),
        ],
        PlayerKind::Generic => vec![uri.to_string()],
    };
    if let Some(agent) = &config.user_agent {
        match kind {
            PlayerKind::Ffplay => args.extend(["-user_agent".to_string(), agent.clone()]),
            PlayerKind::Mpv => args.push(format!("--user-agent={}", agent)),
            PlayerKind::Vlc => args.push(format!("--http-user-agent={}", agent)),
            PlayerKind::Generic => {}
        }
    }
    args
}

/// Auto-detect player paths on Windows
#[cfg(target_os = "windows")]
fn resolve_program(command: &str) -> String {
    let candidates: &[&str] = match command.to_lowercase().as_str() {
        "vlc" | "vlc.exe" => &[
            r"C:\Program Files\VideoLAN\VLC\vlc.exe",
            r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
        ],
        "mpv" | "mpv.exe" => &[r"C:\Program Files\mpv\mpv.exe", r"C:\mpv\mpv.exe"],
        "ffplay" | "ffplay.exe" => &[
            r"C:\ffmpeg\bin\ffplay.exe",
            r"C:\Program Files\ffmpeg\bin\ffplay.exe",
        ],
        _ => &[],
    };
    candidates
        .iter()
        .find(|path| std::path::Path::new(path).exists())
        .map(|s| s.to_string())
        .unwrap_or_else(|| command.to_string())
}

#[cfg(not(target_os = "windows"))]
fn resolve_program(command: &str) -> String {
    command.to_string()
}

/// Program and arguments for one player process, re-runnable for retries
#[derive(Debug, Clone)]
struct Launch {
    program: String,
    args: Vec<String>,
    user_agent: Option<String>,
}

impl Launch {
    fn spawn(&self) -> Result<Child, BackendError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            if PlayerKind::detect(&self.program) == PlayerKind::Ffplay {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }

        if let Some(agent) = &self.user_agent {
            cmd.env("USER_AGENT", agent);
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| BackendError::Spawn {
            player: self.program.clone(),
            reason: e.to_string(),
        })?;
        info!("[PLAY] Player launched (PID: {})", child.id());

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if !line.trim().is_empty() {
                        debug!("[PLAYER] {}", line);
                    }
                }
            });
        }
        Ok(child)
    }
}

/// What the monitor does when the process exits on its own
#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Stream { retries: u32 },
    Ad,
}

/// One live player process plus its monitor thread
struct Running {
    child: Arc<Mutex<Option<Child>>>,
    stopped: Arc<AtomicBool>,
}

impl Running {
    fn start(launch: Launch, role: Role, reporter: Reporter) -> Result<Self, BackendError> {
        let child = Arc::new(Mutex::new(Some(launch.spawn()?)));
        let stopped = Arc::new(AtomicBool::new(false));

        let monitor_child = Arc::clone(&child);
        let monitor_stopped = Arc::clone(&stopped);
        thread::Builder::new()
            .name("player-monitor".to_string())
            .spawn(move || monitor(launch, role, monitor_child, monitor_stopped, reporter))
            .map_err(|e| BackendError::Monitor(e.to_string()))?;

        Ok(Self { child, stopped })
    }

    /// Kill the process; its monitor exits without reporting
    fn stop(self) {
        self.stopped.store(true, Ordering::SeqCst);
        let Ok(mut guard) = self.child.lock() else {
            return;
        };
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn monitor(
    launch: Launch,
    role: Role,
    child: Arc<Mutex<Option<Child>>>,
    stopped: Arc<AtomicBool>,
    reporter: Reporter,
) {
    let mut attempts = 0;
    loop {
        thread::sleep(POLL_INTERVAL);

        let exit = {
            let Ok(mut guard) = child.lock() else {
                return;
            };
            let Some(process) = guard.as_mut() else {
                return;
            };
            match process.try_wait() {
                Ok(None) => continue,
                Ok(Some(status)) => {
                    guard.take();
                    Ok(status)
                }
                Err(e) => Err(e),
            }
        };
        if stopped.load(Ordering::SeqCst) {
            return;
        }

        let status = match exit {
            Ok(status) => status,
            Err(e) => {
                let error = BackendError::Monitor(e.to_string());
                match role {
                    Role::Ad => reporter.report(EventKind::AdFinished(AdOutcome::Errored(
                        AdError::Playback(error.to_string()),
                    ))),
                    Role::Stream { .. } => reporter.report(EventKind::PlaybackFailed(error)),
                }
                return;
            }
        };

        match role {
            Role::Ad if status.success() => {
                return reporter.report(EventKind::AdFinished(AdOutcome::Ended));
            }
            Role::Ad => {
                let error = BackendError::Exited { code: status.code() };
                return reporter.report(EventKind::AdFinished(AdOutcome::Errored(
                    AdError::Playback(error.to_string()),
                )));
            }
            Role::Stream { .. } if status.success() => {
                info!("[PLAY] Player closed");
                return reporter.report(EventKind::PlaybackEnded);
            }
            Role::Stream { retries } if attempts < retries => {
                attempts += 1;
                warn!(
                    "Player exited with {:?}, relaunching ({}/{})",
                    status.code(),
                    attempts,
                    retries
                );
                match launch.spawn() {
                    Ok(process) => match child.lock() {
                        Ok(mut guard) if !stopped.load(Ordering::SeqCst) => {
                            *guard = Some(process);
                        }
                        _ => {
                            let mut process = process;
                            let _ = process.kill();
                            let _ = process.wait();
                            return;
                        }
                    },
                    Err(e) => return reporter.report(EventKind::PlaybackFailed(e)),
                }
            }
            Role::Stream { .. } => {
                return reporter.report(EventKind::PlaybackFailed(BackendError::Exited {
                    code: status.code(),
                }));
            }
        }
    }
}

/// `StreamBackend` that runs one external player process at a time
pub struct ExternalPlayerBackend {
    config: PlayerConfig,
    kind: PlayerKind,
    program: String,
    drm: Option<ClearKey>,
    stream: Option<Running>,
    ad: Option<Running>,
}

impl ExternalPlayerBackend {
    pub fn new(config: PlayerConfig) -> Self {
        let kind = PlayerKind::detect(&config.command);
        let program = resolve_program(&config.command);
        Self {
            config,
            kind,
            program,
            drm: None,
            stream: None,
            ad: None,
        }
    }

    /// New launch settings, used from the next `load` or `play_ad`
    pub fn set_config(&mut self, config: PlayerConfig) {
        self.kind = PlayerKind::detect(&config.command);
        self.program = resolve_program(&config.command);
        self.config = config;
    }

    fn launch(&self, args: Vec<String>) -> Launch {
        Launch {
            program: self.program.clone(),
            args,
            user_agent: self.config.user_agent.clone(),
        }
    }
}

impl StreamBackend for ExternalPlayerBackend {
    fn configure_drm(&mut self, key: Option<ClearKey>) {
        self.drm = key;
    }

    fn load(&mut self, manifest_uri: &str, reporter: Reporter) -> Result<(), BackendError> {
        self.unload();
        let uri = manifest_uri.trim();
        if uri.is_empty() {
            return Err(BackendError::EmptyManifest);
        }
        if self.drm.is_some() && !self.kind.supports_clear_key() {
            return Err(BackendError::DrmUnsupported {
                player: self.config.command.clone(),
            });
        }

        info!("[PLAY] {} | Player: {}", uri, self.program);
        let args = stream_args(&self.config, self.kind, uri, self.drm.as_ref());
        let role = Role::Stream {
            retries: self.config.retry_attempts,
        };
        self.stream = Some(Running::start(self.launch(args), role, reporter)?);
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        // External players start playing on launch
        match self.stream {
            Some(_) => Ok(()),
            None => Err(BackendError::EmptyManifest),
        }
    }

    fn unload(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping stream player");
            stream.stop();
        }
    }

    fn play_ad(&mut self, ad: &AdSpot, reporter: Reporter) -> Result<(), BackendError> {
        self.stop_ad();
        let args = ad_args(&self.config, self.kind, &ad.video_uri);
        self.ad = Some(Running::start(self.launch(args), Role::Ad, reporter)?);
        Ok(())
    }

    fn stop_ad(&mut self) {
        if let Some(ad) = self.ad.take() {
            debug!("Stopping ad player");
            ad.stop();
        }
    }
}

impl Drop for ExternalPlayerBackend {
    fn drop(&mut self) {
        self.stop_ad();
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn key() -> ClearKey {
        ClearKey {
            key_id: "f703e4c8ec9041eeb5028ab4248fa094".to_string(),
            key: "c22f2162e176eee6273a5d0b68d19530".to_string(),
        }
    }

    #[test]
    fn test_detect_player_kind() {
        assert_eq!(PlayerKind::detect("ffplay"), PlayerKind::Ffplay);
        assert_eq!(PlayerKind::detect(r"C:\mpv\mpv.exe"), PlayerKind::Mpv);
        assert_eq!(PlayerKind::detect("/usr/bin/cvlc"), PlayerKind::Vlc);
        assert_eq!(PlayerKind::detect("celluloid"), PlayerKind::Generic);
        assert!(!PlayerKind::Vlc.supports_clear_key());
    }

    #[test]
    fn test_ffplay_stream_args() {
        let config = PlayerConfig {
            slow_connection: true,
            user_agent: Some("UA".to_string()),
            ..Default::default()
        };
        let args = stream_args(&config, PlayerKind::Ffplay, "https://cdn.example.com/live/index.mpd", Some(&key()));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert_eq!(args[pos("-decryption_key") + 1], key().key);
        assert_eq!(args[pos("-reconnect_delay_max") + 1], "30");
        assert_eq!(args[pos("-window_title") + 1], "Litestream - index.mpd");
        assert_eq!(args[pos("-user_agent") + 1], "UA");
        assert!(args.contains(&"-infbuf".to_string()));
        assert!(!args.contains(&"-autoexit".to_string()));
    }

    #[test]
    fn test_mpv_stream_args_without_key() {
        let config = PlayerConfig {
            command: "mpv".to_string(),
            hw_accel: false,
            ..Default::default()
        };
        let args = stream_args(&config, PlayerKind::Mpv, "https://cdn.example.com/a.m3u8?token=1", None);
        assert_eq!(args[0], "https://cdn.example.com/a.m3u8?token=1");
        assert!(args.contains(&"--title=Litestream - a.m3u8".to_string()));
        assert!(args.contains(&"--hwdec=no".to_string()));
        assert!(!args.iter().any(|a| a.contains("decryption_key")));

        let keyed = stream_args(&config, PlayerKind::Mpv, "https://cdn.example.com/a.mpd", Some(&key()));
        assert!(keyed.contains(&format!("--demuxer-lavf-o-append=decryption_key={}", key().key)));
    }

    #[test]
    fn test_vlc_caching_follows_buffer() {
        let config = PlayerConfig {
            buffer_seconds: 15,
            ..Default::default()
        };
        let args = stream_args(&config, PlayerKind::Vlc, "http://server/ch.ts", None);
        assert!(args.contains(&"--network-caching=30000".to_string()));
        assert_eq!(stream_args(&config, PlayerKind::Generic, "http://server/ch.ts", None), vec!["http://server/ch.ts"]);
    }

    #[test]
    fn test_ad_args_exit_at_end() {
        let config = PlayerConfig::default();
        let uri = "https://tv.example.com/assets/ads/1.mp4";
        assert!(ad_args(&config, PlayerKind::Ffplay, uri).contains(&"-autoexit".to_string()));
        assert!(ad_args(&config, PlayerKind::Mpv, uri).contains(&"--keep-open=no".to_string()));
        assert!(ad_args(&config, PlayerKind::Vlc, uri).contains(&"--play-and-exit".to_string()));
    }

    #[test]
    fn test_load_rejects_key_for_unsupported_player() {
        let (tx, _rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "vlc".to_string(),
            ..Default::default()
        });
        backend.configure_drm(Some(key()));
        let result = backend.load("https://cdn.example.com/a.mpd", Reporter::new(1, tx));
        assert_eq!(
            result,
            Err(BackendError::DrmUnsupported {
                player: "vlc".to_string()
            })
        );
    }

    #[test]
    fn test_load_rejects_empty_manifest() {
        let (tx, _rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig::default());
        assert_eq!(backend.load("  ", Reporter::new(1, tx)), Err(BackendError::EmptyManifest));
        assert!(backend.play().is_err());
    }

    #[test]
    fn test_missing_player_is_spawn_error() {
        let (tx, _rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "litestream-no-such-player".to_string(),
            ..Default::default()
        });
        let ad = AdSpot {
            video_uri: "https://tv.example.com/assets/ads/1.mp4".to_string(),
            click_through_uri: None,
        };
        assert!(matches!(
            backend.play_ad(&ad, Reporter::new(1, tx.clone())),
            Err(BackendError::Spawn { .. })
        ));
        assert!(matches!(
            backend.load("https://cdn.example.com/a.m3u8", Reporter::new(1, tx)),
            Err(BackendError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_ad_exit_reports_outcome() {
        let (tx, rx) = channel();
        // `true` ignores its arguments and exits 0
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "true".to_string(),
            ..Default::default()
        });
        let ad = AdSpot {
            video_uri: "clip.mp4".to_string(),
            click_through_uri: None,
        };
        backend.play_ad(&ad, Reporter::new(7, tx)).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.generation, 7);
        assert!(matches!(event.kind, EventKind::AdFinished(AdOutcome::Ended)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stream_failure_reported_after_retries() {
        let (tx, rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "false".to_string(),
            retry_attempts: 1,
            ..Default::default()
        });
        backend.load("clip.m3u8", Reporter::new(3, tx)).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            event.kind,
            EventKind::PlaybackFailed(BackendError::Exited { code: Some(1) })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_stream_exit_reports_end() {
        let (tx, rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "true".to_string(),
            ..Default::default()
        });
        backend.load("clip.m3u8", Reporter::new(4, tx)).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.generation, 4);
        assert!(matches!(event.kind, EventKind::PlaybackEnded));
    }

    #[cfg(unix)]
    #[test]
    fn test_stopped_player_is_not_reported() {
        let (tx, rx) = channel();
        let mut backend = ExternalPlayerBackend::new(PlayerConfig {
            command: "sleep".to_string(),
            ..Default::default()
        });
        // Generic player: the only argument is the uri, here a duration
        backend.load("30", Reporter::new(1, tx)).unwrap();
        backend.unload();
        assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());
    }
}
