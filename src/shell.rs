//! Presentation state and its transitions, kept apart from the widgets so
//! the rules can be exercised without a window.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui::ColorImage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, UserSettings};
use crate::downloader::DownloadEvent;
use crate::env::{Extractor, ToolEnv};
use crate::error::{FetchError, Precondition};
use crate::metadata::{FetchSlot, FetchState};
use crate::model::{
    AudioBitrate, DownloadMode, DownloadOutcome, DownloadRequest, DownloadTarget, ProgressRecord,
    Rendition, RenditionId, VideoDetails,
};
use crate::urls::{clean_url, video_id};

/// Messages from worker threads, applied on the UI thread in arrival order.
pub enum UiEvent {
    /// Provisioning progress
    Status(String),
    Provisioned(ToolEnv),
    Fetched {
        ticket: u64,
        result: Result<VideoDetails, FetchError>,
    },
    Thumbnail {
        ticket: u64,
        image: ColorImage,
    },
    Download(DownloadEvent),
    Finished(DownloadOutcome),
}

#[derive(Debug, Clone)]
pub enum Readiness {
    Provisioning,
    Ready(Arc<ToolEnv>),
}

/// Color class of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Muted,
    Busy,
    Active,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub text: String,
    pub tone: Tone,
}

impl StatusLine {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogLevel {
    Info,
    Warning,
    Error,
}

/// A modal message waiting to be shown
#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub level: DialogLevel,
    pub title: String,
    pub message: String,
}

impl Dialog {
    fn new(level: DialogLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl From<&Precondition> for Dialog {
    fn from(p: &Precondition) -> Self {
        let level = if p.is_error() {
            DialogLevel::Error
        } else if *p == Precondition::NotReady {
            DialogLevel::Info
        } else {
            DialogLevel::Warning
        };
        Dialog::new(level, p.title(), p.to_string())
    }
}

/// Work the UI must hand to a background task
#[derive(Debug)]
pub struct FetchJob {
    pub ticket: u64,
    pub url: String,
    pub extractor: Extractor,
    pub has_transcoder: bool,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct DownloadJob {
    pub env: Arc<ToolEnv>,
    pub request: DownloadRequest,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct ThumbnailJob {
    pub ticket: u64,
    pub url: String,
}

/// The download currently running
#[derive(Debug)]
pub struct DownloadSession {
    pub request: DownloadRequest,
    pub cancel: CancellationToken,
}

pub struct Shell {
    pub url_input: String,
    pub mode: DownloadMode,
    pub output_dir: String,
    pub readiness: Readiness,
    pub status: StatusLine,
    pub details: Option<VideoDetails>,
    pub selected_rendition: usize,
    pub selected_bitrate: usize,
    pub progress: ProgressRecord,
    pub session: Option<DownloadSession>,
    /// Folder of the last finished download
    pub last_output: Option<PathBuf>,
    pub dialogs: VecDeque<Dialog>,
    fetch: FetchSlot,
    fetch_ticket: u64,
    config: AppConfig,
}

impl Shell {
    pub fn new(config: AppConfig, settings: &UserSettings) -> Self {
        Self {
            url_input: String::new(),
            mode: settings.mode,
            output_dir: settings.output_dir.display().to_string(),
            readiness: Readiness::Provisioning,
            status: StatusLine::new("Waiting for dependencies…", Tone::Muted),
            details: None,
            selected_rendition: 0,
            selected_bitrate: 0,
            progress: ProgressRecord::default(),
            session: None,
            last_output: None,
            dialogs: VecDeque::new(),
            fetch: FetchSlot::default(),
            fetch_ticket: 0,
            config,
        }
    }

    pub fn env(&self) -> Option<&Arc<ToolEnv>> {
        match &self.readiness {
            Readiness::Ready(env) => Some(env),
            Readiness::Provisioning => None,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_pending()
    }

    pub fn is_downloading(&self) -> bool {
        self.session.is_some()
    }

    pub fn renditions(&self) -> &[Rendition] {
        self.details.as_ref().map_or(&[], |d| d.renditions.as_slice())
    }

    /// Labels for the options combo in the current mode.
    pub fn option_labels(&self) -> Vec<String> {
        match self.mode {
            DownloadMode::Video => self.renditions().iter().map(|r| r.label.clone()).collect(),
            DownloadMode::Audio => AudioBitrate::ALL.iter().map(|b| b.label()).collect(),
        }
    }

    pub fn selected_option_mut(&mut self) -> &mut usize {
        match self.mode {
            DownloadMode::Video => &mut self.selected_rendition,
            DownloadMode::Audio => &mut self.selected_bitrate,
        }
    }

    pub fn set_mode(&mut self, mode: DownloadMode) {
        if self.mode != mode {
            self.mode = mode;
            self.selected_rendition = 0;
            self.selected_bitrate = 0;
        }
    }

    /// A session that has not been asked to abort.
    fn session_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.cancel.is_cancelled())
    }

    /// Dependency panel line for yt-dlp, once provisioning is done.
    pub fn extractor_line(&self) -> Option<StatusLine> {
        let env = self.env()?;
        Some(match &env.extractor {
            Some(e) if env.extractor_updated => {
                StatusLine::new(format!("✔ yt-dlp {} (just updated!)", e.version), Tone::Busy)
            }
            Some(e) => StatusLine::new(format!("✔ yt-dlp {} (up to date)", e.version), Tone::Success),
            None => StatusLine::new("✘ yt-dlp not available — restart app", Tone::Error),
        })
    }

    /// Dependency panel line for ffmpeg, once provisioning is done.
    pub fn transcoder_line(&self) -> Option<StatusLine> {
        let env = self.env()?;
        Some(match &env.transcoder {
            Some(path) => StatusLine::new(format!("✔ ffmpeg: {}", path.display()), Tone::Success),
            None => StatusLine::new(
                "⚠ ffmpeg not available — MP3 and high-res merging disabled",
                Tone::Busy,
            ),
        })
    }

    pub fn mode_note(&self) -> &'static str {
        match self.mode {
            DownloadMode::Video => {
                "Video mode: downloads video + audio merged into MP4 with AAC audio (Windows Media Player compatible)."
            }
            DownloadMode::Audio => {
                "MP3 mode: extracts audio only, converts to MP3, embeds thumbnail & metadata. Requires ffmpeg."
            }
        }
    }

    /// Current settings worth remembering.
    pub fn settings(&self) -> UserSettings {
        UserSettings {
            output_dir: PathBuf::from(&self.output_dir),
            mode: self.mode,
        }
    }

    pub fn reject(&mut self, precondition: &Precondition) {
        warn!(%precondition, "action rejected");
        self.dialogs.push_back(Dialog::from(precondition));
    }

    fn ready_extractor(&self) -> Result<(&Arc<ToolEnv>, &Extractor), Precondition> {
        let env = self.env().ok_or(Precondition::NotReady)?;
        let extractor = env.extractor.as_ref().ok_or(Precondition::ExtractorMissing)?;
        Ok((env, extractor))
    }

    fn pasted_url(&self) -> Result<String, Precondition> {
        let url = self.url_input.trim();
        if url.is_empty() {
            return Err(Precondition::NoUrl);
        }
        Ok(clean_url(url))
    }

    /// Validates and starts a metadata fetch.
    pub fn begin_fetch(&mut self, now: Instant) -> Result<FetchJob, Precondition> {
        let (env, extractor) = self.ready_extractor()?;
        let (extractor, has_transcoder) = (extractor.clone(), env.has_transcoder());
        if self.fetch.is_pending() {
            return Err(Precondition::Busy);
        }
        let url = self.pasted_url()?;

        let (ticket, cancel) = self.fetch.begin(now, self.config.fetch_timeout);
        self.fetch_ticket = ticket;
        self.status = StatusLine::new("Fetching video info…", Tone::Busy);
        info!(ticket, %url, video_id = ?video_id(&url), "fetch started");
        Ok(FetchJob {
            ticket,
            url,
            extractor,
            has_transcoder,
            cancel,
        })
    }

    /// Validates the form and starts a download session.
    ///
    /// On rejection nothing changes, the status line included.
    pub fn begin_download(&mut self) -> Result<DownloadJob, Precondition> {
        let (env, _) = self.ready_extractor()?;
        let env = Arc::clone(env);
        if self.session.is_some() {
            return Err(Precondition::Busy);
        }
        let url = self.pasted_url()?;

        let target = match self.mode {
            DownloadMode::Video => {
                let renditions = self.renditions();
                if renditions.is_empty() {
                    return Err(Precondition::NoRenditions);
                }
                let id = renditions
                    .get(self.selected_rendition)
                    .map_or(RenditionId::Best, |r| r.id.clone());
                DownloadTarget::Video(id)
            }
            DownloadMode::Audio => {
                if !env.has_transcoder() {
                    return Err(Precondition::TranscoderRequired);
                }
                let bitrate = AudioBitrate::ALL
                    .get(self.selected_bitrate)
                    .copied()
                    .unwrap_or(AudioBitrate::K320);
                DownloadTarget::Audio(bitrate)
            }
        };

        let request = DownloadRequest {
            url,
            target,
            destination: PathBuf::from(self.output_dir.trim()),
        };
        let cancel = CancellationToken::new();
        self.session = Some(DownloadSession {
            request: request.clone(),
            cancel: cancel.clone(),
        });
        self.progress = ProgressRecord::default();
        self.status = match &request.target {
            DownloadTarget::Audio(bitrate) => StatusLine::new(
                format!("Starting MP3 download at {} kbps…", bitrate.kbps()),
                Tone::Active,
            ),
            DownloadTarget::Video(_) => StatusLine::new("Starting video download…", Tone::Active),
        };
        Ok(DownloadJob {
            env,
            request,
            cancel,
        })
    }

    pub fn abort(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
            self.status = StatusLine::new("Aborting…", Tone::Error);
        }
    }

    /// Enforces the client-side fetch timeout.
    pub fn poll(&mut self, now: Instant) {
        if self.fetch.poll_timeout(now) {
            let err = FetchError::TimedOut(self.config.fetch_timeout.as_secs());
            warn!(ticket = self.fetch_ticket, "fetch timed out");
            self.status = StatusLine::new(err.to_string(), Tone::Error);
            self.dialogs.push_back(Dialog::new(
                DialogLevel::Error,
                "Fetch Error",
                format!("Could not fetch video info:\n\n{err}"),
            ));
        }
    }

    /// Whether a thumbnail belongs to the info currently shown.
    pub fn is_current_fetch(&self, ticket: u64) -> bool {
        self.fetch_ticket == ticket && self.fetch.state() == FetchState::Fetched
    }

    /// Applies one worker message. Returns a thumbnail to load, if any.
    pub fn apply(&mut self, event: UiEvent) -> Option<ThumbnailJob> {
        match event {
            UiEvent::Status(msg) => {
                self.status = StatusLine::new(msg, Tone::Busy);
            }
            UiEvent::Provisioned(env) => {
                info!(
                    extractor = ?env.extractor.as_ref().map(|e| &e.version),
                    transcoder = ?env.transcoder,
                    "dependencies ready"
                );
                self.readiness = Readiness::Ready(Arc::new(env));
                self.status = StatusLine::new("Ready.", Tone::Muted);
            }
            UiEvent::Fetched { ticket, result } => return self.fetched(ticket, result),
            // Handled by the widget layer, which owns textures.
            UiEvent::Thumbnail { .. } => {}
            UiEvent::Download(DownloadEvent::Progress(record)) => {
                if self.session_running() {
                    self.status =
                        StatusLine::new(format!("Downloading… {:.1}%", record.percent), Tone::Active);
                    self.progress = record;
                }
            }
            UiEvent::Download(DownloadEvent::PostProcessing) => {
                if self.session_running() {
                    self.status = StatusLine::new("Post-processing…", Tone::Busy);
                }
            }
            UiEvent::Finished(outcome) => self.finished(outcome),
        }
        None
    }

    fn fetched(&mut self, ticket: u64, result: Result<VideoDetails, FetchError>) -> Option<ThumbnailJob> {
        match self.fetch.resolve(ticket, result)? {
            Ok(details) => {
                let thumbnail = details
                    .thumbnail_url
                    .clone()
                    .map(|url| ThumbnailJob { ticket, url });
                self.details = Some(details);
                self.selected_rendition = 0;
                self.status = StatusLine::new(
                    "Info fetched — select options and click Download.",
                    Tone::Success,
                );
                thumbnail
            }
            Err(err) => {
                self.status = StatusLine::new(format!("Error: {err}"), Tone::Error);
                self.dialogs.push_back(Dialog::new(
                    DialogLevel::Error,
                    "Fetch Error",
                    format!("Could not fetch video info:\n\n{err}"),
                ));
                None
            }
        }
    }

    fn finished(&mut self, outcome: DownloadOutcome) {
        let Some(session) = self.session.take() else {
            return;
        };
        match outcome {
            DownloadOutcome::Completed => {
                let label = session.request.target.label();
                let folder = session.request.destination;
                self.progress.percent = 100.0;
                self.status = StatusLine::new(format!("✔ {label} download complete!"), Tone::Success);
                self.dialogs.push_back(Dialog::new(
                    DialogLevel::Info,
                    "Done",
                    format!("{label} saved to:\n{}", folder.display()),
                ));
                self.last_output = Some(folder);
            }
            DownloadOutcome::Cancelled => {
                self.status = StatusLine::new("Download aborted.", Tone::Error);
            }
            DownloadOutcome::Failed(msg) => {
                self.status = StatusLine::new(format!("Error: {msg}"), Tone::Error);
                self.dialogs
                    .push_back(Dialog::new(DialogLevel::Error, "Download Error", msg));
            }
        }
    }
}
