//! Litestream
//! A desktop live-TV portal with pre-roll ads and clear-key streams

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use eframe::egui;
use env_logger::Env;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

mod analytics;
mod api;
mod config;
mod directory;
mod error;
mod location;
mod m3u_parser;
mod models;
mod player;
mod session;
mod ui;


use analytics::LocalTally;
use api::PortalClient;
use config::AppConfig;
use directory::{PlaylistCredentials, PlaylistDirectory};
use location::{Location, APP_TITLE};
use ui::{PortalApp, Sources};

#[derive(Parser, Debug)]
#[command(name = "litestream", version, about = "Desktop live-TV portal")]
struct Cli {
    /// Portal base URL (overrides the saved setting)
    #[arg(long)]
    portal: Option<String>,

    /// M3U playlist URL or file, used when no portal is set
    #[arg(long)]
    playlist: Option<String>,

    /// External player command or path
    #[arg(long)]
    player: Option<String>,

    /// Channel to open on start: a slug or a shared `/home?channel=` link
    #[arg(long)]
    channel: Option<String>,

    /// Skip pre-roll ads for this run
    #[arg(long)]
    no_ads: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(portal) = &self.portal {
            config.portal_url = portal.clone();
        }
        if let Some(playlist) = &self.playlist {
            config.playlist_url = playlist.clone();
        }
        if let Some(player) = &self.player {
            config.external_player = player.clone();
        }
        if self.no_ads {
            config.ads_enabled = false;
        }
    }

    fn deep_link(&self) -> Option<String> {
        let link = self.channel.as_deref()?.trim();
        if link.contains('?') {
            Location::parse_deep_link(link)
        } else {
            Some(link.to_string()).filter(|slug| !slug.is_empty())
        }
    }
}

/// A portal serves every role; a playlist falls back to view counts kept
/// in `tally_path`
fn build_sources(config: &AppConfig, tally_path: &Path) -> Sources {
    let portal_url = config.portal_url.trim();
    if !portal_url.is_empty() {
        match PortalClient::new(portal_url, &config.user_agent) {
            Ok(client) => {
                info!("Using portal {}", client.base_url());
                let client = Arc::new(client);
                return Sources {
                    label: format!("portal {}", client.base_url()),
                    directory: client.clone(),
                    ads: Some(client.clone()),
                    credentials: client.clone(),
                    counter: Some(client.clone()),
                    top: Some(client),
                };
            }
            Err(e) => warn!("Invalid portal URL '{}': {}", portal_url, e),
        }
    }

    let playlist = config.playlist_url.trim();
    if playlist.is_empty() {
        warn!("No portal or playlist configured");
    }
    let tally = Arc::new(LocalTally::open(tally_path));
    Sources {
        label: format!("playlist {}", playlist),
        directory: Arc::new(PlaylistDirectory::new(playlist, &config.user_agent)),
        ads: None,
        credentials: Arc::new(PlaylistCredentials),
        counter: Some(tally.clone()),
        top: Some(tally),
    }
}

/// Window icon: a rounded tile with a broadcast ring around a play mark
fn load_icon() -> egui::IconData {
    let size: usize = 64;
    let mut rgba = vec![0u8; size * size * 4];

    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let nx = x as f32 / size as f32;
            let ny = y as f32 / size as f32;

            let corner = 0.18;
            let dx = if nx < corner { corner - nx } else if nx > 1.0 - corner { nx - (1.0 - corner) } else { 0.0 };
            let dy = if ny < corner { corner - ny } else if ny > 1.0 - corner { ny - (1.0 - corner) } else { 0.0 };
            if dx * dx + dy * dy > corner * corner {
                continue;
            }

            // Teal to indigo (#11998e to #3a3f9a)
            let t = nx * 0.4 + ny * 0.6;
            let mut pixel = [
                (17.0 + (58.0 - 17.0) * t) as u8,
                (153.0 + (63.0 - 153.0) * t) as u8,
                (142.0 + (154.0 - 142.0) * t) as u8,
            ];

            let cx = nx - 0.5;
            let cy = ny - 0.5;
            let dist = (cx * cx + cy * cy).sqrt();
            let in_ring = (0.30..=0.35).contains(&dist);
            let in_play = cx >= -0.10 && cx <= 0.14 && cy.abs() <= (0.14 - cx) * 0.6;

            if in_ring || in_play {
                pixel = [255, 255, 255];
            }

            rgba[idx..idx + 3].copy_from_slice(&pixel);
            rgba[idx + 3] = 255;
        }
    }

    egui::IconData {
        rgba,
        width: size as u32,
        height: size as u32,
    }
}

fn add_emoji_font(fonts: &mut egui::FontDefinitions) {
    #[cfg(target_os = "windows")]
    let candidates = ["C:\\Windows\\Fonts\\seguiemj.ttf"];
    #[cfg(target_os = "linux")]
    let candidates = [
        "/usr/share/fonts/truetype/noto/NotoColorEmoji.ttf",
        "/usr/share/fonts/noto-emoji/NotoColorEmoji.ttf",
        "/usr/share/fonts/google-noto-emoji/NotoColorEmoji.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ];
    #[cfg(target_os = "macos")]
    let candidates = ["/System/Library/Fonts/Apple Color Emoji.ttc"];
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    let candidates: [&str; 0] = [];

    for path in candidates {
        if let Ok(font_data) = std::fs::read(path) {
            fonts.font_data.insert(
                "emoji".to_owned(),
                egui::FontData::from_owned(font_data).into(),
            );
            fonts
                .families
                .entry(egui::FontFamily::Proportional)
                .or_default()
                .push("emoji".to_owned());
            break;
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = AppConfig::load();
    cli.apply(&mut config);
    let deep_link = cli.deep_link();
    let sources = build_sources(&config, &LocalTally::default_path());

    // Force X11 backend on Linux before any windowing code runs
    #[cfg(target_os = "linux")]
    {
        std::env::set_var("WINIT_UNIX_BACKEND", "x11");
        std::env::remove_var("WAYLAND_DISPLAY");
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_min_inner_size([720.0, 480.0])
            .with_icon(load_icon()),
        vsync: true,
        hardware_acceleration: eframe::HardwareAcceleration::Preferred,
        ..Default::default()
    };

    eframe::run_native(
        APP_TITLE,
        options,
        Box::new(move |cc| {
            let mut fonts = egui::FontDefinitions::default();
            add_emoji_font(&mut fonts);
            cc.egui_ctx.set_fonts(fonts);
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(PortalApp::new(config, sources, deep_link)))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "litestream",
            "--playlist",
            "channels.m3u",
            "--player",
            "mpv",
            "--no-ads",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.playlist_url, "channels.m3u");
        assert_eq!(config.external_player, "mpv");
        assert!(!config.ads_enabled);
        assert!(config.portal_url.is_empty());
    }

    #[test]
    fn test_channel_argument_accepts_slug_or_link() {
        let slug = Cli::parse_from(["litestream", "--channel", "tv5"]);
        assert_eq!(slug.deep_link(), Some("tv5".to_string()));

        let link = Cli::parse_from(["litestream", "--channel", "https://tv.example.com/home?channel=one-news"]);
        assert_eq!(link.deep_link(), Some("one-news".to_string()));

        let none = Cli::parse_from(["litestream"]);
        assert_eq!(none.deep_link(), None);
    }

    #[test]
    fn test_playlist_sources_have_no_ads() {
        let config = AppConfig {
            playlist_url: "channels.m3u".to_string(),
            ..AppConfig::default()
        };
        let tally = std::env::temp_dir().join(format!("litestream-sources-{}.json", std::process::id()));
        let sources = build_sources(&config, &tally);
        assert!(sources.ads.is_none());
        assert!(!tally.exists());
        assert!(sources.top.is_some());
    }

    #[test]
    fn test_portal_sources_serve_ads() {
        let config = AppConfig {
            portal_url: "https://tv.example.com".to_string(),
            ..AppConfig::default()
        };
        let unused = std::env::temp_dir().join("litestream-portal-unused.json");
        let sources = build_sources(&config, &unused);
        assert!(sources.ads.is_some());
        assert!(sources.label.starts_with("portal"));
    }
}
