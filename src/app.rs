//! The egui window: draws the shell state and hands work to the runtime.

use std::path::Path;
use std::time::{Duration, Instant};

use eframe::{egui, App, Frame};
use egui::{Color32, RichText, TextureHandle, TextureOptions};
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use crate::config::{AppConfig, UserSettings, APP_ABOUT, APP_GITHUB, APP_NAME, APP_VERSION};
use crate::downloader;
use crate::env::ToolEnv;
use crate::metadata;
use crate::model::DownloadMode;
use crate::provision;
use crate::shell::{
    Dialog, DialogLevel, DownloadJob, FetchJob, Readiness, Shell, ThumbnailJob, Tone, UiEvent,
};
use crate::theme;
use crate::thumbnail::fetch_thumbnail;

pub struct AuroraApp {
    shell: Shell,
    runtime: Handle,
    tx: UnboundedSender<UiEvent>,
    rx: UnboundedReceiver<UiEvent>,
    /// Preview of the fetched video
    thumbnail: Option<TextureHandle>,
    show_about: bool,
}

impl AuroraApp {
    /// Builds the window state and starts provisioning in the background.
    pub fn new(
        ctx: &egui::Context,
        runtime: Handle,
        config: AppConfig,
        settings: &UserSettings,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        let mut app = Self {
            shell: Shell::new(config.clone(), settings),
            runtime,
            tx,
            rx,
            thumbnail: None,
            show_about: false,
        };
        app.start_provisioning(ctx, config);
        app
    }

    fn start_provisioning(&mut self, ctx: &egui::Context, config: AppConfig) {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        let spawned = std::thread::Builder::new()
            .name("provision".to_string())
            .spawn(move || {
                let mut report = |msg: &str| {
                    let _ = tx.send(UiEvent::Status(msg.to_string()));
                    ctx.request_repaint();
                };
                let env = provision::provision(&config, &mut report);
                let _ = tx.send(UiEvent::Provisioned(env));
                ctx.request_repaint();
            });
        if let Err(e) = spawned {
            error!(error = %e, "could not start provisioning thread");
            self.shell.apply(UiEvent::Provisioned(ToolEnv::default()));
        }
    }

    fn spawn_fetch(&self, ctx: &egui::Context, job: FetchJob) {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let FetchJob {
                ticket,
                url,
                extractor,
                has_transcoder,
                cancel,
            } = job;
            let result = metadata::fetch(&extractor, has_transcoder, &url, cancel).await;
            let _ = tx.send(UiEvent::Fetched { ticket, result });
            ctx.request_repaint();
        });
    }

    fn start_download_task(&self, ctx: &egui::Context, job: DownloadJob) {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let DownloadJob {
                env,
                request,
                cancel,
            } = job;
            let events = tx.clone();
            let repaint = ctx.clone();
            let outcome = downloader::spawn_download(
                &env,
                request,
                move |event| {
                    let _ = events.send(UiEvent::Download(event));
                    repaint.request_repaint();
                },
                cancel,
            )
            .await;
            let _ = tx.send(UiEvent::Finished(outcome));
            ctx.request_repaint();
        });
    }

    fn spawn_thumbnail(&self, ctx: &egui::Context, job: ThumbnailJob) {
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn_blocking(move || {
            if let Some(image) = fetch_thumbnail(&job.url) {
                let _ = tx.send(UiEvent::Thumbnail {
                    ticket: job.ticket,
                    image,
                });
                ctx.request_repaint();
            }
        });
    }

    /// Applies everything the workers posted since the last frame.
    fn drain_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                UiEvent::Thumbnail { ticket, image } => {
                    if self.shell.is_current_fetch(ticket) {
                        self.thumbnail =
                            Some(ctx.load_texture("video-thumbnail", image, TextureOptions::LINEAR));
                    }
                }
                event => {
                    if let Some(job) = self.shell.apply(event) {
                        self.spawn_thumbnail(ctx, job);
                    }
                }
            }
        }
    }

    fn show_dialogs(&mut self) {
        while let Some(dialog) = self.shell.dialogs.pop_front() {
            show_message(&dialog);
        }
    }

    fn fetch_clicked(&mut self, ctx: &egui::Context) {
        match self.shell.begin_fetch(Instant::now()) {
            Ok(job) => {
                self.thumbnail = None;
                self.spawn_fetch(ctx, job);
            }
            Err(p) => self.shell.reject(&p),
        }
    }

    fn download_clicked(&mut self, ctx: &egui::Context) {
        match self.shell.begin_download() {
            Ok(job) => {
                self.shell.settings().store();
                self.start_download_task(ctx, job);
            }
            Err(p) => self.shell.reject(&p),
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("Help", |ui| {
                    if ui.button(format!("About {APP_NAME}")).clicked() {
                        self.show_about = true;
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn about_window(&mut self, ctx: &egui::Context) {
        let footer = match self.shell.env() {
            Some(env) => format!(
                "yt-dlp {}   •   ffmpeg: {}",
                env.extractor.as_ref().map_or("not available", |e| e.version.as_str()),
                if env.has_transcoder() { "found" } else { "not found" },
            ),
            None => "Checking dependencies…".to_string(),
        };
        egui::Window::new(format!("About {APP_NAME}"))
            .open(&mut self.show_about)
            .collapsible(false)
            .resizable(false)
            .default_width(460.0)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new(APP_NAME).heading().color(theme::ACCENT));
                    ui.label(RichText::new(format!("Version {APP_VERSION}")).color(theme::MUTED));
                    ui.hyperlink(APP_GITHUB);
                });
                ui.separator();
                egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
                    ui.label(APP_ABOUT);
                });
                ui.separator();
                ui.label(RichText::new(footer).small().color(theme::SUBTLE));
            });
    }

    fn dependency_panel(&self, ui: &mut egui::Ui) {
        section(ui, "Dependencies", |ui| match &self.shell.readiness {
            Readiness::Provisioning => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.colored_label(theme::WARN, self.shell.status.text.as_str());
                });
            }
            Readiness::Ready(_) => {
                for line in [self.shell.extractor_line(), self.shell.transcoder_line()]
                    .into_iter()
                    .flatten()
                {
                    ui.colored_label(tone_color(line.tone), line.text);
                }
            }
        });
    }

    fn url_panel(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        section(ui, "Video URL", |ui| {
            ui.horizontal(|ui| {
                let width = ui.available_width() - 110.0;
                let edit = ui.add(
                    egui::TextEdit::singleline(&mut self.shell.url_input)
                        .hint_text("Paste a YouTube (or other site) URL…")
                        .desired_width(width),
                );
                let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let fetch = ui.add_enabled(
                    !self.shell.is_fetching(),
                    theme::filled_button("Fetch Info", theme::ACCENT),
                );
                if fetch.clicked() || (enter && !self.shell.is_fetching()) {
                    self.fetch_clicked(&ctx);
                }
            });

            ui.add_space(4.0);
            let mut mode = self.shell.mode;
            ui.horizontal(|ui| {
                ui.radio_value(&mut mode, DownloadMode::Video, "🎬 Video (MP4)");
                ui.radio_value(&mut mode, DownloadMode::Audio, "🎵 Audio only (MP3)");
            });
            self.shell.set_mode(mode);
            ui.label(RichText::new(self.shell.mode_note()).small().color(theme::MUTED));
        });
    }

    fn info_panel(&self, ui: &mut egui::Ui) {
        section(ui, "Video Info", |ui| {
            ui.horizontal(|ui| {
                if let Some(tex) = &self.thumbnail {
                    ui.image(tex);
                }
                ui.vertical(|ui| {
                    let (title, duration) = self
                        .shell
                        .details
                        .as_ref()
                        .map_or(("—", "—"), |d| (d.title.as_str(), d.duration.as_str()));
                    ui.horizontal_wrapped(|ui| {
                        ui.label(RichText::new("Title:").color(theme::MUTED));
                        ui.label(RichText::new(title).strong());
                    });
                    ui.horizontal(|ui| {
                        ui.label(RichText::new("Duration:").color(theme::MUTED));
                        ui.label(duration);
                    });
                });
            });
        });
    }

    fn options_panel(&mut self, ui: &mut egui::Ui) {
        section(ui, "Options", |ui| {
            egui::Grid::new("options")
                .num_columns(2)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    let label = match self.shell.mode {
                        DownloadMode::Video => "Resolution:",
                        DownloadMode::Audio => "Quality:",
                    };
                    ui.label(label);
                    let labels = self.shell.option_labels();
                    if labels.is_empty() {
                        ui.add_enabled_ui(false, |ui| {
                            egui::ComboBox::from_id_source("rendition")
                                .width(540.0)
                                .selected_text("Fetch video info first")
                                .show_ui(ui, |_| {});
                        });
                    } else {
                        let selected = self.shell.selected_option_mut();
                        if *selected >= labels.len() {
                            *selected = 0;
                        }
                        egui::ComboBox::from_id_source("rendition")
                            .width(540.0)
                            .show_index(ui, selected, labels.len(), |i| labels[i].clone());
                    }
                    ui.end_row();

                    ui.label("Save to:");
                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(&mut self.shell.output_dir)
                                .desired_width(450.0),
                        );
                        if ui.button("Browse…").clicked() {
                            if let Some(folder) = FileDialog::new()
                                .set_directory(&self.shell.output_dir)
                                .pick_folder()
                            {
                                self.shell.output_dir = folder.display().to_string();
                            }
                        }
                    });
                    ui.end_row();
                });
        });
    }

    fn action_row(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.horizontal(|ui| {
            let downloading = self.shell.is_downloading();
            let download = ui.add_enabled(
                !downloading,
                theme::filled_button("⬇ Download", theme::OK).min_size(egui::vec2(160.0, 34.0)),
            );
            if download.clicked() {
                self.download_clicked(&ctx);
            }
            let abort = ui.add_enabled(
                downloading,
                theme::filled_button("✖ Abort", theme::DANGER).min_size(egui::vec2(110.0, 34.0)),
            );
            if abort.clicked() {
                info!("abort requested");
                self.shell.abort();
            }
        });
    }

    fn progress_panel(&self, ui: &mut egui::Ui) {
        section(ui, "Progress", |ui| {
            let progress = &self.shell.progress;
            let width = ui.available_width();
            ui.add(
                egui::ProgressBar::new(progress.percent / 100.0)
                    .fill(theme::MAUVE)
                    .desired_width(width),
            );
            ui.horizontal(|ui| {
                ui.label(RichText::new(format!("{:.1}%", progress.percent)).strong());
                ui.separator();
                ui.label(format!("Speed: {}", progress.speed_text));
                ui.separator();
                ui.label(format!("ETA: {}", progress.eta_text));
                ui.separator();
                ui.label(format!("Size: {}", progress.size_text));
            });
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.colored_label(tone_color(self.shell.status.tone), self.shell.status.text.as_str());
                if let Some(folder) = &self.shell.last_output {
                    if !self.shell.is_downloading() && ui.small_button("📂 Open folder").clicked() {
                        open_folder(folder);
                    }
                }
            });
        });
    }
}

impl App for AuroraApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // Worker results first, then the fetch deadline
        self.drain_events(ctx);
        self.shell.poll(Instant::now());
        self.show_dialogs();

        self.menu_bar(ctx);
        self.about_window(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                ui.label(RichText::new(APP_NAME).size(26.0).strong().color(theme::ACCENT));
                ui.label(
                    RichText::new("Video & audio downloader powered by yt-dlp").color(theme::MUTED),
                );
                ui.add_space(6.0);

                self.dependency_panel(ui);
                self.url_panel(ui);
                self.info_panel(ui);
                self.options_panel(ui);
                self.action_row(ui);
                ui.add_space(6.0);
                self.progress_panel(ui);
            });
        });

        // Keep polling the queue and the fetch deadline
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

/// Titled group used by every panel.
fn section<R>(ui: &mut egui::Ui, title: &str, add: impl FnOnce(&mut egui::Ui) -> R) -> R {
    ui.add_space(4.0);
    ui.label(RichText::new(title).strong().color(theme::MAUVE));
    let inner = egui::Frame::group(ui.style())
        .fill(theme::SURFACE)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            add(ui)
        })
        .inner;
    ui.add_space(4.0);
    inner
}

fn tone_color(tone: Tone) -> Color32 {
    match tone {
        Tone::Muted => theme::MUTED,
        Tone::Busy => theme::WARN,
        Tone::Active => theme::ACCENT_ACTIVE,
        Tone::Success => theme::OK,
        Tone::Error => theme::DANGER,
    }
}

fn show_message(dialog: &Dialog) {
    let level = match dialog.level {
        DialogLevel::Info => MessageLevel::Info,
        DialogLevel::Warning => MessageLevel::Warning,
        DialogLevel::Error => MessageLevel::Error,
    };
    MessageDialog::new()
        .set_level(level)
        .set_title(&dialog.title)
        .set_description(&dialog.message)
        .set_buttons(MessageButtons::Ok)
        .show();
}

/// Opens the folder in the platform file manager.
fn open_folder(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let result = std::process::Command::new("explorer").arg(&folder).spawn();
        #[cfg(target_os = "macos")]
        let result = std::process::Command::new("open").arg(&folder).spawn();
        #[cfg(all(unix, not(target_os = "macos")))]
        let result = std::process::Command::new("xdg-open").arg(&folder).spawn();
        if let Err(e) = result {
            warn!(error = %e, folder = %folder.display(), "could not open folder");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tone_has_a_distinct_color() {
        let colors = [
            Tone::Muted,
            Tone::Busy,
            Tone::Active,
            Tone::Success,
            Tone::Error,
        ]
        .map(tone_color);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
