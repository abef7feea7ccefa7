//! The tool environment, built once by provisioning and shared read-only.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// A yt-dlp executable that answered `--version`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extractor {
    pub path: PathBuf,
    pub version: String,
}

impl Extractor {
    /// Command with piped output that is killed when its handle is dropped.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(target_os = "windows")]
        {
            // CREATE_NO_WINDOW
            command.creation_flags(0x0800_0000);
        }
        command
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolEnv {
    /// `None` means yt-dlp is unusable until the app is restarted.
    pub extractor: Option<Extractor>,
    /// yt-dlp was downloaded during this launch.
    pub extractor_updated: bool,
    pub transcoder: Option<PathBuf>,
}

impl ToolEnv {
    pub fn has_transcoder(&self) -> bool {
        self.transcoder.is_some()
    }

    /// Directory handed to yt-dlp as `--ffmpeg-location`.
    pub fn transcoder_dir(&self) -> Option<&Path> {
        self.transcoder
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcoder_dir_is_the_parent_directory() {
        let env = ToolEnv {
            transcoder: Some(PathBuf::from("/opt/deps/ffmpeg")),
            ..ToolEnv::default()
        };
        assert!(env.has_transcoder());
        assert_eq!(env.transcoder_dir(), Some(Path::new("/opt/deps")));
        assert_eq!(ToolEnv::default().transcoder_dir(), None);

        let bare = ToolEnv {
            transcoder: Some(PathBuf::from("ffmpeg")),
            ..ToolEnv::default()
        };
        assert_eq!(bare.transcoder_dir(), None);
    }
}
