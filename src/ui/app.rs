//! Desktop shell: channel list, player panel, console and settings

use chrono::Local;
use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::view::{ListIcon, PortalView};
use crate::config::{AppConfig, ConnectionQuality};
use crate::directory::{find_by_slug, search, Pager};
use crate::location::window_title;
use crate::models::{Channel, Tab};
use crate::player::ExternalPlayerBackend;
use crate::session::{
    AdSource, ChannelDirectory, CredentialSource, Layout, Phase, Services, SessionEvent,
    SessionManager, Status, ThreadDispatch, Tone, TopWatchedSource, ViewCounter,
};

const CONSOLE_LIMIT: usize = 500;

/// Where channels, ads, credentials and view counts come from
#[derive(Clone)]
pub struct Sources {
    pub label: String,
    pub directory: Arc<dyn ChannelDirectory>,
    pub ads: Option<Arc<dyn AdSource>>,
    pub credentials: Arc<dyn CredentialSource>,
    pub counter: Option<Arc<dyn ViewCounter>>,
    pub top: Option<Arc<dyn TopWatchedSource>>,
}

/// Results from background tasks
enum TaskResult {
    ChannelsLoaded(Vec<Channel>),
    TopWatchedLoaded(Vec<String>),
    Error(String),
}

fn timestamp_now() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

const LOGO_SIZE: f32 = 40.0;
const MINI_LOGO_SIZE: f32 = 24.0;

/// Channel logo, or a TV glyph when the channel has none
fn logo_widget(ui: &mut egui::Ui, logo: Option<&str>, size: f32) {
    match logo {
        Some(uri) => {
            ui.add(
                egui::Image::new(uri.to_string())
                    .fit_to_exact_size(egui::vec2(size, size))
                    .corner_radius(4.0),
            );
        }
        None => {
            ui.label(egui::RichText::new("📺").size(size * 0.75));
        }
    }
}

fn tone_color(tone: Tone) -> egui::Color32 {
    match tone {
        Tone::Neutral => egui::Color32::GRAY,
        Tone::Accent => egui::Color32::LIGHT_BLUE,
        Tone::Warning => egui::Color32::GOLD,
        Tone::Error => egui::Color32::RED,
    }
}

pub struct PortalApp {
    config: AppConfig,
    sources: Sources,
    session: SessionManager<ExternalPlayerBackend, PortalView>,
    session_events: Receiver<SessionEvent>,

    task_sender: Sender<TaskResult>,
    task_receiver: Receiver<TaskResult>,
    loading: bool,
    status_message: String,

    channels: Vec<Channel>,
    top_watched: Vec<String>,
    search_query: String,
    applied_query: String,
    pager: Pager,
    current_tab: Tab,
    pending_deep_link: Option<String>,
    last_status: Status,

    console_log: Vec<String>,

    // Settings being edited
    external_player: String,
    connection_quality: ConnectionQuality,
    buffer_seconds: u32,
    ads_enabled: bool,
    portal_url: String,
    playlist_url: String,
}

impl PortalApp {
    pub fn new(config: AppConfig, sources: Sources, deep_link: Option<String>) -> Self {
        let (event_sender, session_events) = channel();
        let (task_sender, task_receiver) = channel();

        let services = Services {
            ads: sources.ads.clone().filter(|_| config.ads_enabled),
            credentials: Arc::clone(&sources.credentials),
            counter: sources.counter.clone(),
        };
        let backend = ExternalPlayerBackend::new(config.player_config());
        let session = SessionManager::new(
            backend,
            PortalView::default(),
            services,
            Box::new(ThreadDispatch),
            event_sender,
        )
        .with_minimize_delay(config.minimize_delay());

        let mut app = Self {
            external_player: config.external_player.clone(),
            connection_quality: config.connection_quality,
            buffer_seconds: config.buffer_seconds,
            ads_enabled: config.ads_enabled,
            portal_url: config.portal_url.clone(),
            playlist_url: config.playlist_url.clone(),
            pager: Pager::new(config.channels_per_page),
            config,
            sources,
            session,
            session_events,
            task_sender,
            task_receiver,
            loading: false,
            status_message: "Ready".to_string(),
            channels: Vec::new(),
            top_watched: Vec::new(),
            search_query: String::new(),
            applied_query: String::new(),
            current_tab: Tab::Channels,
            pending_deep_link: deep_link,
            last_status: Status::Idle,
            console_log: Vec::new(),
        };
        let started = format!("[INFO] Litestream started ({})", app.sources.label);
        app.log(&started);
        app.load_channels();
        app
    }

    fn log(&mut self, message: &str) {
        self.console_log.push(format!("[{}] {}", timestamp_now(), message));
        if self.console_log.len() > CONSOLE_LIMIT {
            self.console_log.remove(0);
        }
    }

    fn load_channels(&mut self) {
        self.loading = true;
        self.status_message = "Loading channels...".to_string();
        let directory = Arc::clone(&self.sources.directory);
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let result = match directory.list() {
                Ok(channels) => TaskResult::ChannelsLoaded(channels),
                Err(e) => TaskResult::Error(format!("Failed to load channels: {}", e)),
            };
            let _ = sender.send(result);
        });
    }

    fn load_top_watched(&mut self) {
        let Some(top) = self.sources.top.clone() else {
            return;
        };
        let count = self.config.top_watched_count;
        let sender = self.task_sender.clone();
        thread::spawn(move || match top.top(count) {
            Ok(slugs) => {
                let _ = sender.send(TaskResult::TopWatchedLoaded(slugs));
            }
            // The shelf just keeps its previous content
            Err(e) => log::warn!("Most watched unavailable: {}", e),
        });
    }

    fn open_channel(&mut self, channel: Channel) {
        self.log(&format!("[PLAY] {} ({})", channel.name, channel.group_label()));
        self.session.open(channel);
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.session.current_channel() {
            let name = channel.name.clone();
            self.log(&format!("[PLAY] Closed {}", name));
        }
        self.session.close();
        self.load_top_watched();
    }

    fn process_task_results(&mut self) {
        while let Ok(result) = self.task_receiver.try_recv() {
            match result {
                TaskResult::ChannelsLoaded(channels) => {
                    self.log(&format!("[INFO] Loaded {} channels", channels.len()));
                    self.status_message = format!("Loaded {} channels", channels.len());
                    self.channels = channels;
                    self.loading = false;
                    self.pager.reset();
                    self.load_top_watched();
                    self.open_deep_link();
                }
                TaskResult::TopWatchedLoaded(slugs) => {
                    self.top_watched = slugs;
                }
                TaskResult::Error(msg) => {
                    self.log(&format!("[ERROR] {}", msg));
                    self.status_message = format!("Error: {}", msg);
                    self.loading = false;
                }
            }
        }
    }

    fn open_deep_link(&mut self) {
        let Some(slug) = self.pending_deep_link.take() else {
            return;
        };
        match find_by_slug(&self.channels, &slug).cloned() {
            Some(channel) => self.open_channel(channel),
            None => self.log(&format!("[WARN] No channel matches link '{}'", slug)),
        }
    }

    fn process_session_events(&mut self) {
        while let Ok(event) = self.session_events.try_recv() {
            self.session.handle(event);
        }

        let status = self.session.view().status().clone();
        if status != self.last_status {
            let name = self.session.view().name().unwrap_or_default().to_string();
            match status.tone() {
                Tone::Error => self.log(&format!("[WARN] {}: {}", name, status.text())),
                _ if !status.text().is_empty() => {
                    self.log(&format!("[PLAY] {}: {}", name, status.text()))
                }
                _ => {}
            }
            self.last_status = status;
        }
    }

    fn save_settings(&mut self) {
        self.config.external_player = self.external_player.trim().to_string();
        self.config.connection_quality = self.connection_quality;
        self.config.buffer_seconds = self.buffer_seconds;
        self.config.ads_enabled = self.ads_enabled;
        self.config.portal_url = self.portal_url.trim().to_string();
        self.config.playlist_url = self.playlist_url.trim().to_string();
        self.config.save();

        self.session
            .backend_mut()
            .set_config(self.config.player_config());
        let ads = self.sources.ads.clone().filter(|_| self.config.ads_enabled);
        self.session.set_ads(ads);
        self.log("[INFO] Settings saved");
    }

    fn show_player_panel(&mut self, ui: &mut egui::Ui) {
        let view = self.session.view();
        let card = view.card();
        let name = card.name.as_deref().unwrap_or("Select a Channel");
        let status = card.status.clone();
        let ad = view.ad_controls().cloned();
        let settled = matches!(self.session.phase(), Phase::Playing | Phase::Offline);
        let open = self.session.current().is_some();

        let mut skip = false;
        let mut visit = false;
        let mut minimize = false;
        let mut close = false;

        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.horizontal(|ui| {
                logo_widget(ui, card.logo.as_deref(), LOGO_SIZE);
                ui.label(egui::RichText::new(name).strong().size(18.0));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add_enabled(open, egui::Button::new("✕"))
                        .on_hover_text("Close")
                        .clicked()
                    {
                        close = true;
                    }
                    if ui
                        .add_enabled(settled, egui::Button::new("🗕"))
                        .on_hover_text("Minimize")
                        .clicked()
                    {
                        minimize = true;
                    }
                });
            });
            ui.label(egui::RichText::new(status.text()).color(tone_color(status.tone())));

            if let Some(ad) = &ad {
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    if ui.button("⏭ Skip Ad").clicked() {
                        skip = true;
                    }
                    if ad.click_through_uri.is_some() && ui.button("🔗 Visit").clicked() {
                        visit = true;
                    }
                });
            }
        });

        if visit {
            if let Some(link) = self.session.ad_click_through() {
                ui.ctx().open_url(egui::OpenUrl::new_tab(link));
            }
        }
        if skip {
            self.session.skip_ad();
        }
        if minimize {
            self.session.minimize();
        }
        if close {
            self.close_channel();
        }
    }

    fn show_mini_player(&mut self, ctx: &egui::Context) {
        let Some(card) = self.session.view().mini_player() else {
            return;
        };
        let name = card.name.clone().unwrap_or_default();
        let status = card.status.clone();
        let mut restore = false;
        let mut close = false;

        egui::TopBottomPanel::bottom("mini_player").show(ctx, |ui| {
            ui.horizontal(|ui| {
                logo_widget(ui, card.logo.as_deref(), MINI_LOGO_SIZE);
                ui.label(egui::RichText::new(&name).strong());
                ui.label(egui::RichText::new(status.text()).color(tone_color(status.tone())));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✕").on_hover_text("Close").clicked() {
                        close = true;
                    }
                    if ui.button("⤢").on_hover_text("Restore").clicked() {
                        restore = true;
                    }
                });
            });
        });

        if restore {
            self.session.restore();
        }
        if close {
            self.close_channel();
        }
    }

    fn show_top_watched(&mut self, ui: &mut egui::Ui) {
        let shelf: Vec<Channel> = self
            .top_watched
            .iter()
            .filter_map(|slug| find_by_slug(&self.channels, slug).cloned())
            .collect();
        if shelf.is_empty() {
            return;
        }

        let mut to_play = None;
        ui.label(egui::RichText::new("🔥 Most Watched").strong());
        ui.horizontal_wrapped(|ui| {
            for channel in &shelf {
                if ui.button(&channel.name).clicked() {
                    to_play = Some(channel.clone());
                }
            }
        });
        ui.separator();

        if let Some(channel) = to_play {
            self.open_channel(channel);
        }
    }

    fn show_channels_tab(&mut self, ui: &mut egui::Ui) {
        if self.search_query != self.applied_query {
            self.applied_query = self.search_query.clone();
            self.pager.reset();
        }

        if self.session.view().layout() != Layout::Minimized {
            self.show_player_panel(ui);
            ui.add_space(6.0);
        }
        self.show_top_watched(ui);

        if self.loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading channels...");
            });
            return;
        }

        let current_slug = self.session.current_channel().map(Channel::slug);
        let results = search(&self.channels, &self.applied_query);
        let total = results.len();
        let visible = self.pager.visible(total);
        let view = self.session.view();
        let mut to_play: Option<Channel> = None;
        let mut load_more = false;

        egui::ScrollArea::vertical()
            .id_salt("channels_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                for channel in results.iter().take(visible) {
                    let (icon, color) = match view.list_icon(channel, current_slug.as_deref()) {
                        ListIcon::Current => ("▶", egui::Color32::GREEN),
                        ListIcon::Offline => ("⚠", egui::Color32::RED),
                        ListIcon::Idle => ("●", egui::Color32::GRAY),
                    };
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(icon).color(color));
                        if ui
                            .button(egui::RichText::new(&channel.name).strong())
                            .clicked()
                        {
                            to_play = Some((*channel).clone());
                        }
                        ui.label(egui::RichText::new(channel.group_label()).weak());
                    });
                }

                if total == 0 && !self.channels.is_empty() {
                    ui.label("No channels match your search");
                }
                if self.pager.has_more(total) {
                    ui.add_space(6.0);
                    if ui
                        .button(format!("Load more ({} of {})", visible, total))
                        .clicked()
                    {
                        load_more = true;
                    }
                }
            });

        if load_more {
            self.pager.load_more();
        }
        if let Some(channel) = to_play {
            self.open_channel(channel);
        }
    }

    fn show_console_tab(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Console Log");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("🗑 Clear").clicked() {
                    self.console_log.clear();
                    self.console_log.push(format!("[{}] Console cleared", timestamp_now()));
                }
            });
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.console_log {
                    let color = if line.contains("[ERROR]") {
                        egui::Color32::RED
                    } else if line.contains("[WARN]") {
                        egui::Color32::YELLOW
                    } else if line.contains("[INFO]") {
                        egui::Color32::LIGHT_BLUE
                    } else if line.contains("[PLAY]") {
                        egui::Color32::GREEN
                    } else {
                        egui::Color32::GRAY
                    };
                    ui.label(egui::RichText::new(line).monospace().color(color));
                }
            });
    }

    fn show_settings_tab(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("🎬 Player:");
            ui.add(
                egui::TextEdit::singleline(&mut self.external_player)
                    .hint_text("ffplay, mpv, vlc...")
                    .desired_width(260.0),
            )
            .on_hover_text("Media player command or path. Leave empty for ffplay.\nClear-key channels need ffplay or mpv.");
            if ui.button("📁").on_hover_text("Browse for player executable").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Select Media Player")
                    .pick_file()
                {
                    self.external_player = path.display().to_string();
                }
            }
        });

        ui.horizontal(|ui| {
            ui.label("📶 Connection:");
            egui::ComboBox::from_id_salt("connection_quality")
                .selected_text(self.connection_quality.label())
                .show_ui(ui, |ui| {
                    for quality in [
                        ConnectionQuality::Fast,
                        ConnectionQuality::Normal,
                        ConnectionQuality::Slow,
                        ConnectionQuality::VerySlow,
                        ConnectionQuality::Custom,
                    ] {
                        ui.selectable_value(&mut self.connection_quality, quality, quality.label());
                    }
                });
            if self.connection_quality == ConnectionQuality::Custom {
                ui.add(
                    egui::DragValue::new(&mut self.buffer_seconds)
                        .range(1..=120)
                        .suffix(" s"),
                );
            }
        });

        ui.checkbox(&mut self.ads_enabled, "📢 Pre-roll ads");

        ui.add_space(8.0);
        ui.label(egui::RichText::new("Channel source (used at next start)").strong());
        ui.horizontal(|ui| {
            ui.label("🌐 Portal:");
            ui.add(
                egui::TextEdit::singleline(&mut self.portal_url)
                    .hint_text("https://portal.example.com")
                    .desired_width(300.0),
            );
        });
        ui.horizontal(|ui| {
            ui.label("📺 Playlist:");
            ui.add(
                egui::TextEdit::singleline(&mut self.playlist_url)
                    .hint_text("M3U URL or file")
                    .desired_width(300.0),
            );
            if ui.button("📁").on_hover_text("Browse for playlist file").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Select Playlist")
                    .add_filter("Playlists", &["m3u", "m3u8", "gz"])
                    .add_filter("All Files", &["*"])
                    .pick_file()
                {
                    self.playlist_url = path.display().to_string();
                }
            }
        });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("💾 Save").clicked() {
                self.save_settings();
            }
            if ui.button("⟳ Reload channels").clicked() {
                self.load_channels();
            }
        });
    }
}

impl eframe::App for PortalApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_task_results();
        self.process_session_events();

        self.session.view_mut().tick(Instant::now());
        if let Some(title) = self.session.view_mut().take_title_change() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(window_title(title.as_deref())));
        }

        // Session results and player exits arrive from worker threads
        if self.loading || self.session.is_busy() || self.session.view().minimize_pending() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else if self.session.current().is_some() {
            ctx.request_repaint_after(Duration::from_millis(500));
        }

        if self.config.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.current_tab, Tab::Channels, "📺 CHANNELS");
                ui.selectable_value(&mut self.current_tab, Tab::Settings, "⚙ SETTINGS");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.selectable_value(&mut self.current_tab, Tab::Console, "🖥 CONSOLE");
                });
            });
            if self.current_tab == Tab::Channels {
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.search_query)
                            .hint_text("Search...")
                            .desired_width(200.0),
                    );
                    if !self.search_query.is_empty() && ui.button("✕").clicked() {
                        self.search_query.clear();
                    }
                });
            }
            ui.add_space(3.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_message);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new(self.session.location().to_string()).weak());
                });
            });
        });

        self.show_mini_player(ctx);

        egui::CentralPanel::default().show(ctx, |ui| match self.current_tab {
            Tab::Channels => self.show_channels_tab(ui),
            Tab::Console => self.show_console_tab(ui),
            Tab::Settings => self.show_settings_tab(ui),
        });
    }
}
