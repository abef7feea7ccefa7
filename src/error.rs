use thiserror::Error;

/// Failures while fetching or installing yt-dlp and ffmpeg.
///
/// These never reach the user as dialogs; the provisioner turns them into
/// status lines and leaves the tool marked unavailable.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("{0} not found in archive")]
    MissingMember(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No info returned — check the URL.")]
    NoInfo,

    #[error("{0}")]
    Tool(String),

    #[error("could not read yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not run yt-dlp: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("Fetch timed out after {0}s — check your connection or URL.")]
    TimedOut(u64),
}

/// Internal orchestrator failures; callers only see a `DownloadOutcome`.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Tool(String),

    #[error("download aborted by user")]
    Cancelled,
}

/// Checks that fail before any background work is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("Dependencies are still loading.")]
    NotReady,

    #[error("yt-dlp not available. Restart the app.")]
    ExtractorMissing,

    #[error("Please paste a URL first.")]
    NoUrl,

    #[error("Please fetch video info first.")]
    NoRenditions,

    #[error(
        "ffmpeg was not found or could not be downloaded.\nCheck your internet connection and restart the app."
    )]
    TranscoderRequired,

    #[error("A download is already running.")]
    Busy,
}

impl Precondition {
    /// Dialog title shown above the message.
    pub fn title(&self) -> &'static str {
        match self {
            Precondition::NotReady => "Please wait",
            Precondition::ExtractorMissing => "yt-dlp missing",
            Precondition::NoUrl => "No URL",
            Precondition::NoRenditions => "No Format",
            Precondition::TranscoderRequired => "ffmpeg Required",
            Precondition::Busy => "Busy",
        }
    }

    /// Whether the dialog is an error rather than a hint.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Precondition::ExtractorMissing | Precondition::TranscoderRequired
        )
    }
}
