//! The extraction library seam and its yt-dlp implementation.

use crate::deps::Libraries;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::job::{Job, Mode, Quality};
use crate::progress::{self, ProgressEvent, ProgressStatus};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Whether a URL resolved to a single item or a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Playlist,
}

/// One playlist entry, as listed without resolving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub title: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
}

/// What the extractor knows about a URL before downloading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub kind: MediaKind,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub entries: Vec<EntryInfo>,
}

impl MediaInfo {
    pub fn is_playlist(&self) -> bool {
        self.kind == MediaKind::Playlist
    }

    /// Title and thumbnail to preview: the first entry for playlists.
    pub fn preview(&self) -> (Option<&str>, Option<&str>) {
        match self.entries.first() {
            Some(entry) if self.is_playlist() => (
                entry.title.as_deref().or(self.title.as_deref()),
                entry.thumbnail.as_deref().or(self.thumbnail.as_deref()),
            ),
            _ => (self.title.as_deref(), self.thumbnail.as_deref()),
        }
    }

    /// Parses the output of `yt-dlp --dump-single-json --flat-playlist`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawInfo = serde_json::from_str(json)?;
        let kind = match raw.kind.as_deref() {
            Some("playlist") | Some("multi_video") => MediaKind::Playlist,
            _ => MediaKind::Video,
        };

        let thumbnail = raw.thumbnail.or_else(|| best_thumbnail(&raw.thumbnails));
        let entries = raw
            .entries
            .into_iter()
            .flatten()
            .map(|entry| EntryInfo {
                title: entry.title,
                url: entry.url,
                thumbnail: entry.thumbnail.or_else(|| best_thumbnail(&entry.thumbnails)),
            })
            .collect();

        Ok(Self {
            kind,
            title: raw.title,
            thumbnail,
            entries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    title: Option<String>,
    url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

// yt-dlp orders thumbnails from worst to best.
fn best_thumbnail(thumbnails: &[RawThumbnail]) -> Option<String> {
    thumbnails.iter().rev().find_map(|thumb| thumb.url.clone())
}

/// The parameter set for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub mode: Mode,
    /// Passed as `--ffmpeg-location`.
    pub ffmpeg_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(job: &Job, output_dir: &Path, ffmpeg_dir: &Path) -> Self {
        Self {
            url: job.url.trim().to_string(),
            output_dir: output_dir.to_path_buf(),
            mode: job.mode,
            ffmpeg_dir: ffmpeg_dir.to_path_buf(),
        }
    }

    /// The `-o` template: playlist index and title for albums, title only otherwise.
    pub fn output_template(&self) -> String {
        let name = match self.mode {
            Mode::Album { .. } => "%(playlist_index)s-%(title)s.%(ext)s",
            Mode::Single(_) => "%(title)s.%(ext)s",
        };
        self.output_dir.join(name).to_string_lossy().to_string()
    }

    /// The `-f` format selector.
    pub fn format_selector(&self) -> String {
        match self.mode {
            Mode::Single(Quality::Video { max_height }) => format!(
                "bestvideo[height<={}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                max_height
            ),
            Mode::Single(Quality::Audio { .. }) | Mode::Album { .. } => {
                "bestaudio/best".to_string()
            }
        }
    }

    /// The full yt-dlp argument list, URL last.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--ignore-errors".to_string(),
            "--encoding".to_string(),
            "utf-8".to_string(),
            "--ffmpeg-location".to_string(),
            self.ffmpeg_dir.to_string_lossy().to_string(),
            "--progress-template".to_string(),
            progress::progress_template(),
            "-o".to_string(),
            self.output_template(),
            "-f".to_string(),
            self.format_selector(),
        ];

        if let Some(kbps) = self.mode.audio_bitrate() {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                format!("{}K", kbps),
            ]);
        }

        args.push(self.url.clone());
        args
    }
}

/// The external component that resolves URLs and downloads media.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetches title, thumbnail and the unresolved entry list of `url`.
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo>;

    /// Downloads according to `request`, reporting progress to `on_progress`.
    ///
    /// Must return promptly once `cancel` fires; any error returned after
    /// cancellation is treated as a cancellation.
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: &(dyn Fn(ProgressEvent) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// [`Extractor`] backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    pub libraries: Libraries,
}

impl YtDlp {
    pub fn new(libraries: Libraries) -> Self {
        Self { libraries }
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--encoding".to_string(),
            "utf-8".to_string(),
            url.trim().to_string(),
        ];

        let output = Executor::new(self.libraries.youtube.clone(), args)
            .execute()
            .await?;
        MediaInfo::from_json(&output.stdout)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: &(dyn Fn(ProgressEvent) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Downloading {} into {}", request.url, request.output_dir.display());

        let mut command = tokio::process::Command::new(&self.libraries.youtube);
        command
            .args(request.args())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(0x08000000);
        }

        let mut child = command
            .spawn()
            .map_err(|e| Error::Command(format!("failed to start yt-dlp: {}", e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut reader = BufReader::new(stderr);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = String::from_utf8_lossy(&raw);
                debug!("yt-dlp: {}", line.trim_end());
                collected.push_str(&line);
            }
            collected
        });

        // Console code pages can produce titles that are not UTF-8.
        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        let mut finished_items = 0usize;
        loop {
            raw.clear();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Cancellation requested, stopping yt-dlp");
                    let _ = child.kill().await;
                    stderr_task.abort();
                    return Err(Error::Cancelled);
                }
                read = reader.read_until(b'\n', &mut raw) => read?,
            };
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&raw);
            match progress::parse_line(&line) {
                Some(event) => {
                    if event.status == ProgressStatus::Finished {
                        finished_items += 1;
                    }
                    on_progress(event);
                }
                None => debug!("yt-dlp: {}", line.trim_end()),
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(Error::Cancelled);
            }
            status = child.wait() => status?,
        };
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        // --ignore-errors still exits non-zero when some playlist items failed.
        if finished_items > 0 {
            warn!(
                "yt-dlp reported errors for some items ({} item(s) downloaded): {}",
                finished_items,
                stderr.trim()
            );
            return Ok(());
        }

        Err(Error::Command(format!(
            "yt-dlp failed with code {}: {}",
            status.code().unwrap_or(-1),
            stderr.trim()
        )))
    }
}
