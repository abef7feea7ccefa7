//! Title, duration and rendition lookup through yt-dlp's info mode.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HIGH_RES_THRESHOLD;
use crate::env::Extractor;
use crate::error::FetchError;
use crate::model::{Rendition, RenditionId, VideoDetails};
use crate::options::ExtractorOptions;

const MIB: f64 = 1_048_576.0;

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// One stream entry of yt-dlp's `formats` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub ext: Option<String>,
    pub fps: Option<f64>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
}

/// Runs yt-dlp in info mode and builds the rendition list.
///
/// The child is killed as soon as `cancel` fires.
pub async fn fetch(
    extractor: &Extractor,
    has_transcoder: bool,
    url: &str,
    cancel: CancellationToken,
) -> Result<VideoDetails, FetchError> {
    let args = ExtractorOptions::metadata().to_args(url);
    debug!(?args, "fetching video info");

    let child = extractor.command().args(&args).spawn()?;
    let output = tokio::select! {
        out = child.wait_with_output() => out?,
        _ = cancel.cancelled() => {
            warn!(url, "video info fetch cancelled");
            return Err(FetchError::Cancelled);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::Tool(tool_message(&stderr, output.status)));
    }

    let info: Option<VideoInfo> = if output.stdout.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice(&output.stdout)?
    };
    let info = info.ok_or(FetchError::NoInfo)?;

    let details = VideoDetails {
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        duration: format_duration(info.duration),
        thumbnail_url: info.thumbnail,
        renditions: build_renditions(&info.formats, has_transcoder),
    };
    info!(
        title = %details.title,
        renditions = details.renditions.len(),
        "video info fetched"
    );
    Ok(details)
}

/// Picks the most useful line of yt-dlp's stderr.
pub(crate) fn tool_message(stderr: &str, status: std::process::ExitStatus) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or(lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

/// Video renditions, highest first, one per (height, container), behind a
/// synthetic "best" entry.
pub fn build_renditions(formats: &[RawFormat], has_transcoder: bool) -> Vec<Rendition> {
    let mut sorted: Vec<&RawFormat> = formats.iter().collect();
    sorted.sort_by_key(|f| Reverse(f.height.unwrap_or(0)));

    let mut seen = HashSet::new();
    let mut choices = vec![Rendition::best()];
    for f in sorted {
        let Some(height) = f.height.filter(|h| *h > 0) else {
            continue;
        };
        match f.vcodec.as_deref() {
            None | Some("none") => continue,
            Some(_) => {}
        }
        let ext = f.ext.as_deref().unwrap_or("?");
        if !seen.insert((height, ext.to_string())) {
            continue;
        }
        let fid = f.format_id.clone().unwrap_or_default();
        let fps = f
            .fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| format!(" {}fps", fps as u32))
            .unwrap_or_default();
        let size = f
            .filesize
            .or(f.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| format!("  ~{:.0} MB", s / MIB))
            .unwrap_or_default();
        let warn = if !has_transcoder && height > HIGH_RES_THRESHOLD {
            "  ⚠ needs ffmpeg"
        } else {
            ""
        };
        choices.push(Rendition {
            label: format!("{height}p{fps}  [{ext}]{size}{warn}  (id:{fid})"),
            id: RenditionId::Format(fid),
        });
    }
    choices
}

/// `HH:MM:SS`, or a dash for unknown or zero durations.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) if secs >= 1.0 => {
            let secs = secs as u64;
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        }
        _ => "—".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Pending { ticket: u64, deadline: Instant },
    Fetched,
    TimedOut,
    Failed,
}

/// Single-assignment slot for the in-flight fetch.
///
/// Only the first of {result, error, timeout} moves the slot out of
/// `Pending`; anything arriving later, or for an older ticket, is dropped.
#[derive(Debug)]
pub struct FetchSlot {
    state: FetchState,
    next_ticket: u64,
    cancel: Option<CancellationToken>,
}

impl Default for FetchSlot {
    fn default() -> Self {
        Self {
            state: FetchState::Idle,
            next_ticket: 0,
            cancel: None,
        }
    }
}

impl FetchSlot {
    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FetchState::Pending { .. })
    }

    /// Starts a new fetch and returns its ticket and cancellation token.
    pub fn begin(&mut self, now: Instant, timeout: Duration) -> (u64, CancellationToken) {
        if let Some(old) = self.cancel.take() {
            old.cancel();
        }
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.state = FetchState::Pending {
            ticket,
            deadline: now + timeout,
        };
        (ticket, token)
    }

    /// Accepts the worker's result if it is the first word on `ticket`.
    pub fn resolve(
        &mut self,
        ticket: u64,
        result: Result<VideoDetails, FetchError>,
    ) -> Option<Result<VideoDetails, FetchError>> {
        match self.state {
            FetchState::Pending { ticket: current, .. } if current == ticket => {
                self.state = if result.is_ok() {
                    FetchState::Fetched
                } else {
                    FetchState::Failed
                };
                self.cancel = None;
                Some(result)
            }
            _ => {
                debug!(ticket, state = ?self.state, "discarding late fetch result");
                None
            }
        }
    }

    /// Moves a pending fetch past its deadline to `TimedOut` and cancels the
    /// worker. Returns true on that transition.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        match self.state {
            FetchState::Pending { deadline, .. } if now >= deadline => {
                self.state = FetchState::TimedOut;
                if let Some(token) = self.cancel.take() {
                    token.cancel();
                }
                true
            }
            _ => false,
        }
    }
}
