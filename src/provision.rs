//! Startup check, download and version pinning of yt-dlp and ffmpeg.
//!
//! Nothing here fails past its own boundary: problems are reported through
//! the status callback and the tool is left out of the resulting `ToolEnv`.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::config::{
    AppConfig, BINARY_TIMEOUT, CHUNK_SIZE, EXTRACTOR_FALLBACK_TAG, METADATA_TIMEOUT,
    TRANSCODER_ARCHIVE_MEMBER, USER_AGENT,
};
use crate::env::{Extractor, ToolEnv};
use crate::error::ProvisionError;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Runs both checks in order and builds the environment the rest of the
/// app reads from.
pub fn provision(config: &AppConfig, report: &mut dyn FnMut(&str)) -> ToolEnv {
    let (extractor, extractor_updated) = ensure_extractor(config, report);
    let transcoder = ensure_transcoder(config, report);
    ToolEnv {
        extractor,
        extractor_updated,
        transcoder,
    }
}

/// Makes sure the managed yt-dlp matches the latest release tag.
///
/// Returns the usable extractor, if any, and whether it was downloaded now.
pub fn ensure_extractor(config: &AppConfig, report: &mut dyn FnMut(&str)) -> (Option<Extractor>, bool) {
    if let Err(e) = fs::create_dir_all(&config.deps_dir) {
        warn!(error = %e, dir = %config.deps_dir.display(), "could not create dependency directory");
    }
    report("Checking yt-dlp…");

    let latest = match latest_tag(&config.release_index_url) {
        Ok(tag) => Some(tag),
        Err(e) => {
            warn!(error = %e, "release index unavailable");
            None
        }
    };
    let stored = read_marker(&config.extractor_marker);
    let exists = config.extractor_exe.is_file();
    debug!(?latest, ?stored, exists, "yt-dlp version check");

    let mut updated = false;
    if needs_download(exists, stored.as_deref(), latest.as_deref()) {
        let tag = choose_tag(latest.as_deref(), stored.as_deref());
        let url = format!("{}/{tag}/{}", config.release_base_url, extractor_asset_name());
        report(&format!("Downloading yt-dlp {tag}…"));
        match install_extractor(config, &url, tag, report) {
            Ok(()) => {
                info!(tag, "yt-dlp installed");
                updated = true;
            }
            Err(e) => {
                warn!(error = %e, "yt-dlp download failed");
                report(&format!("yt-dlp download failed: {e}"));
            }
        }
    }

    let extractor = probe_version(&config.extractor_exe).map(|version| Extractor {
        path: config.extractor_exe.clone(),
        version,
    });
    match &extractor {
        Some(found) => report(&format!("yt-dlp {} ready.", found.version)),
        None => report("yt-dlp not available."),
    }
    (extractor, updated)
}

fn install_extractor(
    config: &AppConfig,
    url: &str,
    tag: &str,
    report: &mut dyn FnMut(&str),
) -> Result<(), ProvisionError> {
    let staging = config.extractor_exe.with_extension("part");
    download_file(url, &staging, &mut |done, total| {
        report(&format!(
            "Downloading yt-dlp {tag}… {}%",
            done * 100 / total.max(1)
        ));
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&staging, fs::Permissions::from_mode(0o755))?;
    }
    fs::rename(&staging, &config.extractor_exe)?;
    write_marker(&config.extractor_marker, tag)?;
    Ok(())
}

/// Local copy, then the search path, then well-known install locations;
/// downloads a build only on Windows.
pub fn ensure_transcoder(config: &AppConfig, report: &mut dyn FnMut(&str)) -> Option<PathBuf> {
    let on_path = which::which(crate::config::exe_name("ffmpeg")).ok();
    if let Some(found) = locate_transcoder(&config.transcoder_exe, on_path, &well_known_transcoders()) {
        info!(path = %found.display(), "ffmpeg found");
        return Some(found);
    }

    if !cfg!(target_os = "windows") {
        report("⚠ ffmpeg not found. Install via package manager.");
        return None;
    }

    report("Downloading ffmpeg from GitHub…");
    match install_transcoder(config, report) {
        Ok(path) => {
            report("ffmpeg ready.");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "ffmpeg install failed");
            report(&format!("ffmpeg download failed: {e}"));
            None
        }
    }
}

fn install_transcoder(config: &AppConfig, report: &mut dyn FnMut(&str)) -> Result<PathBuf, ProvisionError> {
    fs::create_dir_all(&config.deps_dir)?;
    let archive = std::env::temp_dir().join("ffmpeg_dl.zip");
    download_file(&config.transcoder_archive_url, &archive, &mut |done, total| {
        report(&format!("Downloading ffmpeg… {}%", done * 100 / total.max(1)));
    })?;
    report("Extracting ffmpeg…");
    let extracted = extract_member(&archive, TRANSCODER_ARCHIVE_MEMBER, &config.transcoder_exe);
    if let Err(e) = fs::remove_file(&archive) {
        debug!(error = %e, "could not remove ffmpeg archive");
    }
    extracted?;
    Ok(config.transcoder_exe.clone())
}

/// Download when the binary is missing or a newer tag is known.
pub fn needs_download(exists: bool, stored: Option<&str>, latest: Option<&str>) -> bool {
    !exists || latest.is_some_and(|latest| stored != Some(latest))
}

pub fn choose_tag<'a>(latest: Option<&'a str>, stored: Option<&'a str>) -> &'a str {
    latest.or(stored).unwrap_or(EXTRACTOR_FALLBACK_TAG)
}

pub fn extractor_asset_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "yt-dlp_macos"
    } else {
        "yt-dlp"
    }
}

fn well_known_transcoders() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[r"C:\ffmpeg\bin\ffmpeg.exe", r"C:\Program Files\ffmpeg\bin\ffmpeg.exe"]
    } else {
        &["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"]
    };
    paths.iter().map(PathBuf::from).collect()
}

pub fn locate_transcoder(local: &Path, on_path: Option<PathBuf>, well_known: &[PathBuf]) -> Option<PathBuf> {
    if local.is_file() {
        return Some(local.to_path_buf());
    }
    if let Some(found) = on_path {
        return Some(found);
    }
    well_known.iter().find(|p| p.is_file()).cloned()
}

pub fn read_marker(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn write_marker(path: &Path, tag: &str) -> Result<(), ProvisionError> {
    fs::write(path, tag)?;
    Ok(())
}

fn client(timeout: Duration) -> Result<Client, ProvisionError> {
    Ok(Client::builder().user_agent(USER_AGENT).timeout(timeout).build()?)
}

fn latest_tag(index_url: &str) -> Result<String, ProvisionError> {
    let release: Release = client(METADATA_TIMEOUT)?
        .get(index_url)
        .send()?
        .error_for_status()?
        .json()?;
    Ok(release.tag_name)
}

/// Streams `url` into `dest` in fixed-size chunks.
fn download_file(
    url: &str,
    dest: &Path,
    on_progress: &mut dyn FnMut(u64, u64),
) -> Result<(), ProvisionError> {
    debug!(url, dest = %dest.display(), "downloading");
    let mut response = client(BINARY_TIMEOUT)?.get(url).send()?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);
    let mut file = File::create(dest)?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    let mut last_percent = None;
    loop {
        let read = response.read(&mut buf)?;
        if read == 0 {
            break;
        }
        file.write_all(&buf[..read])?;
        done += read as u64;
        if total > 0 {
            let percent = done * 100 / total;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                on_progress(done, total);
            }
        }
    }
    file.flush()?;
    Ok(())
}

/// Copies the single archive entry whose path ends in `suffix` to `dest`.
pub fn extract_member(archive: &Path, suffix: &str, dest: &Path) -> Result<(), ProvisionError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let suffix = suffix.to_lowercase();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().replace('\\', "/").to_lowercase();
        if name.ends_with(&suffix) {
            let mut out = File::create(dest)?;
            std::io::copy(&mut entry, &mut out)?;
            return Ok(());
        }
    }
    Err(ProvisionError::MissingMember(suffix))
}

/// Asks the binary for its version; `None` if it cannot run.
fn probe_version(exe: &Path) -> Option<String> {
    if !exe.is_file() {
        return None;
    }
    let mut command = std::process::Command::new(exe);
    command.arg("--version");
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        // CREATE_NO_WINDOW
        command.creation_flags(0x0800_0000);
    }
    match command.output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Some(if version.is_empty() { "unknown".to_string() } else { version })
        }
        Ok(output) => {
            warn!(status = %output.status, "yt-dlp --version failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "could not run yt-dlp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use zip::write::SimpleFileOptions;

    #[rstest]
    #[case(false, Some("2025.01.26"), Some("2025.01.26"), true)]
    #[case(true, Some("2025.01.26"), Some("2025.01.26"), false)]
    #[case(true, Some("2024.12.01"), Some("2025.01.26"), true)]
    #[case(true, None, Some("2025.01.26"), true)]
    #[case(true, Some("2024.12.01"), None, false)]
    #[case(true, None, None, false)]
    #[case(false, None, None, true)]
    fn decides_when_to_download(
        #[case] exists: bool,
        #[case] stored: Option<&str>,
        #[case] latest: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(needs_download(exists, stored, latest), expected);
    }

    #[test]
    fn tag_prefers_latest_then_stored_then_fallback() {
        assert_eq!(choose_tag(Some("2025.02.01"), Some("2024.01.01")), "2025.02.01");
        assert_eq!(choose_tag(None, Some("2024.01.01")), "2024.01.01");
        assert_eq!(choose_tag(None, None), EXTRACTOR_FALLBACK_TAG);
    }

    #[test]
    fn marker_round_trips_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("yt-dlp.version");
        assert_eq!(read_marker(&marker), None);
        fs::write(&marker, "2025.01.26\n").unwrap();
        assert_eq!(read_marker(&marker).as_deref(), Some("2025.01.26"));
        write_marker(&marker, "2025.02.01").unwrap();
        assert_eq!(read_marker(&marker).as_deref(), Some("2025.02.01"));
        fs::write(&marker, "  \n").unwrap();
        assert_eq!(read_marker(&marker), None);
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_only_the_matching_member() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ffmpeg.zip");
        write_zip(
            &archive,
            &[
                ("ffmpeg-master/LICENSE.txt", b"license"),
                ("ffmpeg-master/bin/ffprobe.exe", b"probe"),
                ("ffmpeg-master/bin/ffmpeg.exe", b"the binary"),
            ],
        );
        let dest = dir.path().join("ffmpeg.exe");
        extract_member(&archive, TRANSCODER_ARCHIVE_MEMBER, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"the binary");
    }

    #[test]
    fn missing_member_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ffmpeg.zip");
        write_zip(&archive, &[("readme.txt", b"nothing here")]);
        let result = extract_member(&archive, TRANSCODER_ARCHIVE_MEMBER, &dir.path().join("out"));
        assert_matches!(result, Err(ProvisionError::MissingMember(_)));
    }

    #[test]
    fn local_copy_wins_over_path_and_well_known() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("ffmpeg");
        let known = dir.path().join("known-ffmpeg");
        fs::write(&known, b"").unwrap();
        let on_path = Some(PathBuf::from("/usr/bin/ffmpeg"));

        assert_eq!(
            locate_transcoder(&local, on_path.clone(), &[known.clone()]),
            on_path
        );
        assert_eq!(locate_transcoder(&local, None, &[known.clone()]), Some(known.clone()));

        fs::write(&local, b"").unwrap();
        assert_eq!(locate_transcoder(&local, on_path, &[known]), Some(local));
        assert_eq!(locate_transcoder(&dir.path().join("none"), None, &[]), None);
    }

    fn offline_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::with_deps_dir(dir.join("ytdl_deps"));
        config.release_index_url = "http://127.0.0.1:9/releases/latest".to_string();
        config.release_base_url = "http://127.0.0.1:9/download".to_string();
        config
    }

    #[test]
    fn failed_download_leaves_extractor_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path());
        let mut messages = Vec::new();
        let (extractor, updated) = ensure_extractor(&config, &mut |m| messages.push(m.to_string()));
        assert_eq!(extractor, None);
        assert!(!updated);
        assert!(messages.iter().any(|m| m.starts_with("Downloading yt-dlp 2025.01.26")));
        assert!(messages.iter().any(|m| m.starts_with("yt-dlp download failed")));
        assert_eq!(read_marker(&config.extractor_marker), None);
    }

    #[cfg(unix)]
    #[test]
    fn offline_start_keeps_the_installed_extractor() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path());
        fs::create_dir_all(&config.deps_dir).unwrap();
        fs::write(&config.extractor_exe, "#!/bin/sh\necho 2024.12.13\n").unwrap();
        fs::set_permissions(&config.extractor_exe, fs::Permissions::from_mode(0o755)).unwrap();
        write_marker(&config.extractor_marker, "2024.12.13").unwrap();

        let mut messages = Vec::new();
        let (extractor, updated) = ensure_extractor(&config, &mut |m| messages.push(m.to_string()));
        let extractor = extractor.unwrap();
        assert_eq!(extractor.version, "2024.12.13");
        assert!(!updated);
        assert!(!messages.iter().any(|m| m.starts_with("Downloading")));
        assert_eq!(messages.last().map(String::as_str), Some("yt-dlp 2024.12.13 ready."));
    }
}
