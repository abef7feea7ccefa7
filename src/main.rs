//! AuroraFetch: desktop front-end for yt-dlp and ffmpeg

// The egui window
mod app;
// Constants, dependency paths and persisted settings
mod config;
// Download orchestration (yt-dlp child process)
mod downloader;
// Provisioned tool handles
mod env;
// Error enums shared by the workers
mod error;
// Video info and rendition list
mod metadata;
// Data models for requests, renditions and progress
mod model;
// yt-dlp command-line options
mod options;
// Progress line parsing utilities
mod progress;
// yt-dlp and ffmpeg provisioning
mod provision;
// Presentation state and its transitions
mod shell;
// Colors and widget styling
mod theme;
// Thumbnail fetching
mod thumbnail;
// URL normalization
mod urls;

use app::AuroraApp;
use config::{AppConfig, UserSettings, APP_NAME};

use eframe::egui;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Program entry point: sets up logging and the runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default filter
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aurora_fetch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Worker runtime for fetches, downloads and thumbnails
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .thread_name("aurora-worker")
        .build()?;

    let config = AppConfig::from_env();
    let settings = UserSettings::load();
    info!(deps_dir = %config.deps_dir.display(), "starting {APP_NAME}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([880.0, 790.0])
            .with_min_inner_size([820.0, 720.0]),
        ..Default::default()
    };
    let handle = runtime.handle().clone();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            theme::apply(&cc.egui_ctx);
            Box::new(AuroraApp::new(&cc.egui_ctx, handle, config, &settings))
        }),
    )?;

    // Kills any child still running
    runtime.shutdown_background();
    Ok(())
}
