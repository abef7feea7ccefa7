//! Application constants, dependency paths and persisted user settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::DownloadMode;

pub const APP_NAME: &str = "AuroraFetch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_GITHUB: &str = "https://github.com/Nadirisim/AuroraFetch";
pub const USER_AGENT: &str = concat!("AuroraFetch/", env!("CARGO_PKG_VERSION"));

pub const APP_ABOUT: &str = "AuroraFetch is a free, open-source video and audio downloader \
built on top of yt-dlp. It supports YouTube, YouTube Music, and hundreds of other websites, \
all wrapped in a clean, easy-to-use interface.

It does not collect data and talks to no servers except GitHub, where yt-dlp and ffmpeg \
are downloaded from their official release pages.

FEATURES
  - Download videos in any available resolution as MP4
  - Download audio as MP3 at up to 320 kbps
  - Embeds album art and metadata into MP3 files
  - AAC audio encoding for Windows Media Player compatibility
  - Supports youtu.be short links and hundreds of other sites via yt-dlp
  - Updates yt-dlp from GitHub on every launch
  - Downloads ffmpeg automatically on Windows
  - Real-time download speed, ETA, and progress bar
  - Abort any download mid-way with a single click";

/// Release index queried for the latest yt-dlp tag.
pub const EXTRACTOR_RELEASE_INDEX: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";
pub const EXTRACTOR_RELEASE_BASE: &str = "https://github.com/yt-dlp/yt-dlp/releases/download";
/// Used when neither the release index nor the marker file yields a tag.
pub const EXTRACTOR_FALLBACK_TAG: &str = "2025.01.26";

pub const TRANSCODER_ARCHIVE_URL: &str =
    "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip";
pub const TRANSCODER_ARCHIVE_MEMBER: &str = "/bin/ffmpeg.exe";

pub const METADATA_TIMEOUT: Duration = Duration::from_secs(15);
pub const BINARY_TIMEOUT: Duration = Duration::from_secs(120);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Heights above this are flagged when no transcoder can merge streams.
pub const HIGH_RES_THRESHOLD: u32 = 720;
/// Audio bitrate (kbps) used when muxing video with AAC audio.
pub const MUX_AUDIO_KBPS: u32 = 192;

const DEPS_DIR_NAME: &str = "ytdl_deps";
const EXTRACTOR_MARKER: &str = "yt-dlp.version";

/// Paths and endpoints resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub deps_dir: PathBuf,
    pub extractor_exe: PathBuf,
    pub transcoder_exe: PathBuf,
    pub extractor_marker: PathBuf,
    pub release_index_url: String,
    pub release_base_url: String,
    pub transcoder_archive_url: String,
    pub fetch_timeout: Duration,
}

impl AppConfig {
    /// Resolves the dependency directory next to the running executable.
    pub fn from_env() -> Self {
        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::with_deps_dir(app_dir.join(DEPS_DIR_NAME))
    }

    pub fn with_deps_dir(deps_dir: PathBuf) -> Self {
        Self {
            extractor_exe: deps_dir.join(exe_name("yt-dlp")),
            transcoder_exe: deps_dir.join(exe_name("ffmpeg")),
            extractor_marker: deps_dir.join(EXTRACTOR_MARKER),
            deps_dir,
            release_index_url: EXTRACTOR_RELEASE_INDEX.to_string(),
            release_base_url: EXTRACTOR_RELEASE_BASE.to_string(),
            transcoder_archive_url: TRANSCODER_ARCHIVE_URL.to_string(),
            fetch_timeout: FETCH_TIMEOUT,
        }
    }
}

/// Appends the platform executable suffix.
pub fn exe_name(stem: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}

/// Preferences remembered between launches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub output_dir: PathBuf,
    pub mode: DownloadMode,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            mode: DownloadMode::Video,
        }
    }
}

impl UserSettings {
    pub fn load() -> Self {
        match confy::load::<UserSettings>("aurora_fetch", "settings") {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "could not load settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn store(&self) {
        if let Err(e) = confy::store("aurora_fetch", "settings", self) {
            warn!(error = %e, "could not store settings");
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}
