use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::MUX_AUDIO_KBPS;
use crate::env::ToolEnv;
use crate::error::DownloadError;
use crate::metadata::tool_message;
use crate::model::{DownloadMode, DownloadOutcome, DownloadRequest, DownloadTarget, ProgressRecord, RenditionId};
use crate::options::{ExtractorOptions, PostProcessor};
use crate::progress::{normalize, parse_progress_from_line, ProgressStatus};

/// Non-terminal updates from a running download
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    Progress(ProgressRecord),
    /// A file finished downloading; merging or encoding follows
    PostProcessing,
}

/// Format selector for a video rendition.
pub fn format_selector(id: &RenditionId, has_transcoder: bool) -> String {
    match (id, has_transcoder) {
        (RenditionId::Best, true) => "bestvideo+bestaudio/best".to_string(),
        (RenditionId::Best, false) => "best".to_string(),
        (RenditionId::Format(fid), true) => format!("{fid}+bestaudio/best"),
        (RenditionId::Format(fid), false) => fid.clone(),
    }
}

/// yt-dlp options for a request in the given tool environment.
pub fn download_options(env: &ToolEnv, request: &DownloadRequest) -> ExtractorOptions {
    let mut options = ExtractorOptions::download_into(&request.destination);
    let ffmpeg_dir = env.transcoder_dir().map(Path::to_path_buf);
    match &request.target {
        DownloadTarget::Video(id) => {
            options.format = Some(format_selector(id, env.has_transcoder()));
            if ffmpeg_dir.is_some() {
                options.ffmpeg_location = ffmpeg_dir;
                options.merge_output_format = Some("mp4".to_string());
                options.postprocessor_args = Some((
                    "Merger".to_string(),
                    vec![
                        "-c:v".to_string(),
                        "copy".to_string(),
                        "-c:a".to_string(),
                        "aac".to_string(),
                        "-b:a".to_string(),
                        format!("{MUX_AUDIO_KBPS}k"),
                    ],
                ));
            }
        }
        DownloadTarget::Audio(bitrate) => {
            options.format = Some("bestaudio/best".to_string());
            options.ffmpeg_location = ffmpeg_dir;
            options.postprocessors = vec![
                PostProcessor::ExtractAudio {
                    codec: "mp3",
                    kbps: bitrate.kbps(),
                },
                PostProcessor::Metadata,
                PostProcessor::EmbedThumbnail,
            ];
        }
    }
    options
}

/// Runs one download to its terminal outcome.
///
/// `on_event` receives progress in the order yt-dlp reports it. Once
/// `cancel` fires the child is killed and the outcome is `Cancelled`, even
/// if the tool reported an error while going down.
pub async fn spawn_download(
    env: &ToolEnv,
    request: DownloadRequest,
    mut on_event: impl FnMut(DownloadEvent) + Send,
    cancel: CancellationToken,
) -> DownloadOutcome {
    info!(url = %request.url, target = ?request.target, dest = %request.destination.display(), "starting download");
    let outcome = match run(env, &request, &mut on_event, &cancel).await {
        Ok(()) if cancel.is_cancelled() => DownloadOutcome::Cancelled,
        Ok(()) => DownloadOutcome::Completed,
        Err(_) if cancel.is_cancelled() => DownloadOutcome::Cancelled,
        Err(DownloadError::Cancelled) => DownloadOutcome::Cancelled,
        Err(e) => {
            error!(error = %e, "download failed");
            DownloadOutcome::Failed(e.to_string())
        }
    };
    info!(%outcome, "download finished");
    outcome
}

async fn run(
    env: &ToolEnv,
    request: &DownloadRequest,
    on_event: &mut (impl FnMut(DownloadEvent) + Send),
    cancel: &CancellationToken,
) -> Result<(), DownloadError> {
    let extractor = env
        .extractor
        .as_ref()
        .ok_or_else(|| DownloadError::Tool("yt-dlp not available. Restart the app.".to_string()))?;
    if request.target.mode() == DownloadMode::Audio && !env.has_transcoder() {
        return Err(DownloadError::Tool("ffmpeg is required for MP3 downloads.".to_string()));
    }

    let args = download_options(env, request).to_args(&request.url);
    debug!(?args, "yt-dlp arguments");

    let mut child = extractor
        .command()
        .args(&args)
        .spawn()
        .map_err(DownloadError::Spawn)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("yt-dlp stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("yt-dlp stderr not captured"))?;
    let stderr_task = tokio::spawn(collect_lines(stderr));

    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(DownloadError::Cancelled);
            }
        };
        let Some(line) = line else { break };
        handle_line(&line, cancel, on_event)?;
    }

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(DownloadError::Cancelled);
        }
    };
    let stderr = stderr_task.await.unwrap_or_default();
    if !status.success() {
        return Err(DownloadError::Tool(tool_message(&stderr, status)));
    }
    Ok(())
}

/// Progress-callback path: every progress line checks the abort flag first.
fn handle_line(
    line: &str,
    cancel: &CancellationToken,
    on_event: &mut impl FnMut(DownloadEvent),
) -> Result<(), DownloadError> {
    let Some(raw) = parse_progress_from_line(line) else {
        trace!(line, "yt-dlp");
        return Ok(());
    };
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }
    match raw.status {
        ProgressStatus::Downloading => on_event(DownloadEvent::Progress(normalize(&raw))),
        ProgressStatus::Finished => on_event(DownloadEvent::PostProcessing),
        ProgressStatus::Other(status) => trace!(%status, "ignoring progress status"),
    }
    Ok(())
}

async fn collect_lines(reader: impl AsyncRead + Unpin) -> String {
    let mut buf = String::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        buf.push_str(&line);
        buf.push('\n');
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Extractor;
    use crate::model::AudioBitrate;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use std::path::PathBuf;

    fn env(transcoder: bool) -> ToolEnv {
        ToolEnv {
            extractor: Some(Extractor {
                path: PathBuf::from("/deps/yt-dlp"),
                version: "2025.01.26".to_string(),
            }),
            extractor_updated: false,
            transcoder: transcoder.then(|| PathBuf::from("/deps/ffmpeg")),
        }
    }

    fn request(target: DownloadTarget) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            target,
            destination: PathBuf::from("/home/me/Downloads"),
        }
    }

    #[rstest]
    #[case(RenditionId::Best, true, "bestvideo+bestaudio/best")]
    #[case(RenditionId::Best, false, "best")]
    #[case(RenditionId::Format("137".into()), true, "137+bestaudio/best")]
    #[case(RenditionId::Format("137".into()), false, "137")]
    fn selects_formats(#[case] id: RenditionId, #[case] transcoder: bool, #[case] expected: &str) {
        assert_eq!(format_selector(&id, transcoder), expected);
    }

    #[test]
    fn video_with_transcoder_merges_to_mp4_with_aac() {
        let options = download_options(&env(true), &request(DownloadTarget::Video(RenditionId::Best)));
        assert_eq!(options.merge_output_format.as_deref(), Some("mp4"));
        assert_eq!(options.ffmpeg_location, Some(PathBuf::from("/deps")));
        let (processor, args) = options.postprocessor_args.unwrap();
        assert_eq!(processor, "Merger");
        assert_eq!(args.join(" "), "-c:v copy -c:a aac -b:a 192k");
    }

    #[test]
    fn video_without_transcoder_uses_a_single_stream() {
        let options = download_options(
            &env(false),
            &request(DownloadTarget::Video(RenditionId::Format("18".into()))),
        );
        assert_eq!(options.format.as_deref(), Some("18"));
        assert_eq!(options.merge_output_format, None);
        assert_eq!(options.ffmpeg_location, None);
    }

    #[test]
    fn audio_extracts_tags_and_embeds_the_thumbnail() {
        let options = download_options(&env(true), &request(DownloadTarget::Audio(AudioBitrate::K192)));
        assert_eq!(options.format.as_deref(), Some("bestaudio/best"));
        assert_eq!(
            options.postprocessors,
            vec![
                PostProcessor::ExtractAudio { codec: "mp3", kbps: 192 },
                PostProcessor::Metadata,
                PostProcessor::EmbedThumbnail,
            ]
        );
    }

    #[test]
    fn progress_line_after_abort_is_cancellation() {
        let cancel = CancellationToken::new();
        let mut events = Vec::new();
        let line = "[aurora] downloading|10|100|NA|NA|NA";
        handle_line(line, &cancel, &mut |e| events.push(e)).unwrap();
        cancel.cancel();
        let result = handle_line(line, &cancel, &mut |e| events.push(e));
        assert_matches!(result, Err(DownloadError::Cancelled));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn finished_event_announces_post_processing() {
        let cancel = CancellationToken::new();
        let mut events = Vec::new();
        handle_line("[aurora] finished|100|100|NA|NA|NA", &cancel, &mut |e| events.push(e)).unwrap();
        handle_line("[Merger] Merging formats", &cancel, &mut |e| events.push(e)).unwrap();
        assert_eq!(events, vec![DownloadEvent::PostProcessing]);
    }

    #[tokio::test]
    async fn audio_without_transcoder_fails_before_spawning() {
        let outcome = spawn_download(
            &env(false),
            request(DownloadTarget::Audio(AudioBitrate::K320)),
            |_| {},
            CancellationToken::new(),
        )
        .await;
        assert_matches!(outcome, DownloadOutcome::Failed(msg) if msg.contains("ffmpeg"));
    }

    #[cfg(unix)]
    mod with_script {
        use super::*;
        use crate::env::testing::script_extractor;
        use std::sync::{Arc, Mutex};

        fn script_env(dir: &Path, body: &str) -> ToolEnv {
            ToolEnv {
                extractor: Some(script_extractor(dir, body)),
                extractor_updated: false,
                transcoder: None,
            }
        }

        #[tokio::test]
        async fn streams_progress_then_completes() {
            let dir = tempfile::tempdir().unwrap();
            let env = script_env(
                dir.path(),
                "echo '[download] Destination: x.mp4'\n\
                 echo '[aurora] downloading|50000000|100000000|NA|1048576|47'\n\
                 echo '[aurora] finished|100000000|100000000|NA|NA|NA'\n",
            );
            let mut events = Vec::new();
            let outcome = spawn_download(
                &env,
                request(DownloadTarget::Video(RenditionId::Best)),
                |e| events.push(e),
                CancellationToken::new(),
            )
            .await;
            assert_eq!(outcome, DownloadOutcome::Completed);
            assert_eq!(events.len(), 2);
            assert_matches!(&events[0], DownloadEvent::Progress(p) if p.percent == 50.0 && p.eta_text == "00:47");
            assert_eq!(events[1], DownloadEvent::PostProcessing);
        }

        #[tokio::test]
        async fn tool_failure_is_a_generic_error() {
            let dir = tempfile::tempdir().unwrap();
            let env = script_env(
                dir.path(),
                "echo 'ERROR: [youtube] x: Video unavailable' >&2\nexit 1\n",
            );
            let outcome = spawn_download(
                &env,
                request(DownloadTarget::Video(RenditionId::Best)),
                |_| {},
                CancellationToken::new(),
            )
            .await;
            assert_eq!(
                outcome,
                DownloadOutcome::Failed("ERROR: [youtube] x: Video unavailable".to_string())
            );
        }

        #[tokio::test]
        async fn abort_mid_transfer_is_never_reported_as_error() {
            let dir = tempfile::tempdir().unwrap();
            let env = script_env(
                dir.path(),
                "for i in 1 2 3 4 5 6 7 8 9 10; do\n\
                   echo \"[aurora] downloading|$i|10|NA|NA|NA\"\n\
                   sleep 0.2\n\
                 done\n\
                 echo 'ERROR: interrupted' >&2\nexit 1\n",
            );
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let seen = Arc::new(Mutex::new(0usize));
            let counter = Arc::clone(&seen);
            let outcome = spawn_download(
                &env,
                request(DownloadTarget::Video(RenditionId::Best)),
                move |_| {
                    *counter.lock().unwrap() += 1;
                    trigger.cancel();
                },
                cancel,
            )
            .await;
            assert_eq!(outcome, DownloadOutcome::Cancelled);
            assert_eq!(*seen.lock().unwrap(), 1);
        }
    }
}
