use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the user wants to end up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadMode {
    /// Video and audio merged into MP4
    Video,
    /// Audio only, converted to MP3
    Audio,
}

/// MP3 bitrates offered in audio mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBitrate {
    K320,
    K256,
    K192,
    K128,
    K96,
}

impl AudioBitrate {
    pub const ALL: [AudioBitrate; 5] = [
        AudioBitrate::K320,
        AudioBitrate::K256,
        AudioBitrate::K192,
        AudioBitrate::K128,
        AudioBitrate::K96,
    ];

    pub fn kbps(self) -> u32 {
        match self {
            AudioBitrate::K320 => 320,
            AudioBitrate::K256 => 256,
            AudioBitrate::K192 => 192,
            AudioBitrate::K128 => 128,
            AudioBitrate::K96 => 96,
        }
    }

    pub fn label(self) -> String {
        match self {
            AudioBitrate::K320 => "320 kbps (best quality)".to_string(),
            AudioBitrate::K96 => "96 kbps (smallest file)".to_string(),
            other => format!("{} kbps", other.kbps()),
        }
    }
}

/// Identifier handed to the extraction tool's format selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenditionId {
    /// Let the tool pick the best streams
    Best,
    /// A concrete `format_id` reported by the tool
    Format(String),
}

/// One selectable entry of the resolution list
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub id: RenditionId,
    pub label: String,
}

impl Rendition {
    pub fn best() -> Self {
        Self {
            id: RenditionId::Best,
            label: "Best (auto-selected)".to_string(),
        }
    }
}

/// Result of a metadata fetch
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
    pub title: String,
    /// `HH:MM:SS`, or a dash when unknown
    pub duration: String,
    pub thumbnail_url: Option<String>,
    /// `Best` is always the first entry
    pub renditions: Vec<Rendition>,
}

/// What a download should produce
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadTarget {
    Video(RenditionId),
    Audio(AudioBitrate),
}

impl DownloadTarget {
    pub fn mode(&self) -> DownloadMode {
        match self {
            DownloadTarget::Video(_) => DownloadMode::Video,
            DownloadTarget::Audio(_) => DownloadMode::Audio,
        }
    }

    /// Short name used in completion messages
    pub fn label(&self) -> &'static str {
        match self {
            DownloadTarget::Video(_) => "Video",
            DownloadTarget::Audio(_) => "MP3",
        }
    }
}

/// A validated download, ready to hand to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    /// Already normalized
    pub url: String,
    pub target: DownloadTarget,
    pub destination: PathBuf,
}

/// Progress as displayed in the progress panel
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    /// 0.0 to 100.0
    pub percent: f32,
    pub speed_text: String,
    pub eta_text: String,
    pub size_text: String,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            percent: 0.0,
            speed_text: "—".to_string(),
            eta_text: "—".to_string(),
            size_text: "—".to_string(),
        }
    }
}

/// How a download ended
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed,
    /// The user pressed Abort
    Cancelled,
    /// The tool failed; carries its message
    Failed(String),
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Completed => write!(f, "completed"),
            DownloadOutcome::Cancelled => write!(f, "aborted"),
            DownloadOutcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_labels_mark_the_extremes() {
        let labels: Vec<String> = AudioBitrate::ALL.iter().map(|b| b.label()).collect();
        assert_eq!(
            labels,
            vec![
                "320 kbps (best quality)",
                "256 kbps",
                "192 kbps",
                "128 kbps",
                "96 kbps (smallest file)",
            ]
        );
    }

    #[test]
    fn target_knows_its_mode() {
        assert_eq!(DownloadTarget::Video(RenditionId::Best).mode(), DownloadMode::Video);
        assert_eq!(DownloadTarget::Audio(AudioBitrate::K192).mode(), DownloadMode::Audio);
        assert_eq!(DownloadTarget::Audio(AudioBitrate::K192).label(), "MP3");
    }
}
