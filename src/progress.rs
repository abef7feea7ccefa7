use crate::model::ProgressRecord;

/// Marker that starts every progress line we ask yt-dlp to print.
pub const PROGRESS_PREFIX: &str = "[aurora]";

/// Value for `--progress-template`: one line per progress event, fields
/// separated by `|`, unknown values printed by yt-dlp as `NA`.
pub const PROGRESS_TEMPLATE: &str = "download:[aurora] %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

const MIB: f64 = 1_048_576.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressStatus {
    Downloading,
    /// One file finished; muxing or encoding may follow
    Finished,
    Other(String),
}

/// A progress event as reported by the extraction tool
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgress {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    pub total_bytes_estimate: Option<f64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>,
}

pub fn parse_progress_from_line(line: &str) -> Option<RawProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.trim().split('|');
    let status = match fields.next()?.trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        other => ProgressStatus::Other(other.to_string()),
    };
    let mut number = || fields.next().and_then(parse_number);
    Some(RawProgress {
        status,
        downloaded_bytes: number(),
        total_bytes: number(),
        total_bytes_estimate: number(),
        speed: number(),
        eta: number(),
    })
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Turns a raw event into the numbers shown in the progress panel.
pub fn normalize(raw: &RawProgress) -> ProgressRecord {
    let done = raw.downloaded_bytes.unwrap_or(0.0);
    let total = raw
        .total_bytes
        .or(raw.total_bytes_estimate)
        .filter(|t| *t > 0.0);
    let percent = match total {
        Some(total) => (done / total * 100.0).clamp(0.0, 100.0) as f32,
        None => 0.0,
    };
    let speed = raw.speed.unwrap_or(0.0) / MIB;

    ProgressRecord {
        percent,
        speed_text: format!("{speed:.2} MB/s"),
        eta_text: format_eta(raw.eta),
        size_text: total.map_or_else(|| "—".to_string(), |t| format!("{:.1} MB", t / MIB)),
    }
}

/// `MM:SS`; minutes keep counting past the hour.
pub fn format_eta(eta: Option<f64>) -> String {
    match eta {
        Some(secs) if secs >= 1.0 => {
            let secs = secs as u64;
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        _ => "—".to_string(),
    }
}
