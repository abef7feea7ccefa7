//! yt-dlp option set and its command-line rendering

use std::path::{Path, PathBuf};

use crate::progress::PROGRESS_TEMPLATE;

/// Post-processing steps run by yt-dlp after the download
#[derive(Debug, Clone, PartialEq)]
pub enum PostProcessor {
    /// Extract the audio track and transcode it
    ExtractAudio { codec: &'static str, kbps: u32 },
    /// Write title/artist tags
    Metadata,
    /// Embed the thumbnail as cover art
    EmbedThumbnail,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractorOptions {
    /// Format selector, e.g. `bestvideo+bestaudio/best`
    pub format: Option<String>,
    /// Output path template
    pub outtmpl: Option<PathBuf>,
    /// Emit machine-readable progress lines
    pub progress: bool,
    pub quiet: bool,
    pub no_warnings: bool,
    /// Print the info JSON instead of downloading
    pub dump_info: bool,
    pub ffmpeg_location: Option<PathBuf>,
    pub merge_output_format: Option<String>,
    /// Extra arguments for one post-processor, keyed by its name
    pub postprocessor_args: Option<(String, Vec<String>)>,
    pub postprocessors: Vec<PostProcessor>,
}

impl ExtractorOptions {
    /// Quiet, progress-reporting base shared by all downloads.
    pub fn download_into(destination: &Path) -> Self {
        Self {
            outtmpl: Some(destination.join("%(title)s.%(ext)s")),
            progress: true,
            quiet: true,
            no_warnings: true,
            ..Self::default()
        }
    }

    /// Info-only invocation.
    pub fn metadata() -> Self {
        Self {
            quiet: true,
            no_warnings: true,
            dump_info: true,
            ..Self::default()
        }
    }

    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args = Vec::new();
        if self.quiet {
            args.push("--quiet".to_owned());
        }
        if self.no_warnings {
            args.push("--no-warnings".to_owned());
        }
        if self.dump_info {
            args.push("--dump-single-json".to_owned());
            args.push("--skip-download".to_owned());
            args.push("--no-playlist".to_owned());
        }
        if let Some(format) = &self.format {
            args.push("-f".to_owned());
            args.push(format.clone());
        }
        if let Some(outtmpl) = &self.outtmpl {
            args.push("-o".to_owned());
            args.push(outtmpl.to_string_lossy().into_owned());
        }
        if self.progress {
            args.push("--progress".to_owned());
            args.push("--newline".to_owned());
            args.push("--progress-template".to_owned());
            args.push(PROGRESS_TEMPLATE.to_owned());
        }
        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_owned());
            args.push(location.to_string_lossy().into_owned());
        }
        if let Some(container) = &self.merge_output_format {
            args.push("--merge-output-format".to_owned());
            args.push(container.clone());
        }
        if let Some((processor, extra)) = &self.postprocessor_args {
            args.push("--postprocessor-args".to_owned());
            args.push(format!("{processor}:{}", extra.join(" ")));
        }
        for step in &self.postprocessors {
            match step {
                PostProcessor::ExtractAudio { codec, kbps } => {
                    args.push("-x".to_owned());
                    args.push("--audio-format".to_owned());
                    args.push((*codec).to_owned());
                    args.push("--audio-quality".to_owned());
                    args.push(format!("{kbps}K"));
                }
                PostProcessor::Metadata => args.push("--embed-metadata".to_owned()),
                PostProcessor::EmbedThumbnail => args.push("--embed-thumbnail".to_owned()),
            }
        }
        args.push("--".to_owned());
        args.push(url.to_owned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_mode_dumps_json_without_downloading() {
        let args = ExtractorOptions::metadata().to_args("https://example.com/v");
        assert_eq!(
            args,
            vec![
                "--quiet",
                "--no-warnings",
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--",
                "https://example.com/v",
            ]
        );
    }

    #[test]
    fn download_base_reports_progress_into_the_destination() {
        let args = ExtractorOptions::download_into(Path::new("/tmp/out")).to_args("u");
        let template = Path::new("/tmp/out").join("%(title)s.%(ext)s");
        let pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[pos + 1], template.to_string_lossy());
        assert!(args.contains(&"--progress".to_owned()));
        assert!(args.contains(&PROGRESS_TEMPLATE.to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("u"));
    }

    #[test]
    fn post_processors_render_in_order() {
        let options = ExtractorOptions {
            postprocessors: vec![
                PostProcessor::ExtractAudio { codec: "mp3", kbps: 256 },
                PostProcessor::Metadata,
                PostProcessor::EmbedThumbnail,
            ],
            ..ExtractorOptions::default()
        };
        let args = options.to_args("u");
        assert_eq!(
            &args[..7],
            &[
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "256K",
                "--embed-metadata",
                "--embed-thumbnail",
            ]
        );
    }

    #[test]
    fn merger_args_are_joined_under_the_processor_name() {
        let options = ExtractorOptions {
            postprocessor_args: Some((
                "Merger".to_owned(),
                vec!["-c:v".into(), "copy".into(), "-c:a".into(), "aac".into()],
            )),
            ..ExtractorOptions::default()
        };
        let args = options.to_args("u");
        assert_eq!(args[0], "--postprocessor-args");
        assert_eq!(args[1], "Merger:-c:v copy -c:a aac");
    }
}
