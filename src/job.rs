//! Download jobs and their outcomes.

use crate::error::{Error, Result};
use crate::metadata::TagReport;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Video heights offered by the front-end.
pub const VIDEO_HEIGHTS: [u32; 4] = [1080, 720, 480, 360];
/// MP3 bitrates (kbps) offered by the front-end.
pub const AUDIO_BITRATES: [u32; 3] = [320, 192, 128];

/// What a single download produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// MP4 video capped at `max_height` pixels.
    Video { max_height: u32 },
    /// MP3 audio transcoded at `bitrate_kbps`.
    Audio { bitrate_kbps: u32 },
}

/// How the output is organised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain download; playlists land in a folder named after the playlist.
    Single(Quality),
    /// Playlist restructured into an `Artist - Album` folder of tagged MP3s.
    Album { bitrate_kbps: u32 },
}

impl Mode {
    pub fn is_album(&self) -> bool {
        matches!(self, Mode::Album { .. })
    }

    /// The MP3 bitrate when the mode extracts audio.
    pub fn audio_bitrate(&self) -> Option<u32> {
        match self {
            Mode::Single(Quality::Audio { bitrate_kbps }) | Mode::Album { bitrate_kbps } => {
                Some(*bitrate_kbps)
            }
            Mode::Single(Quality::Video { .. }) => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Single(Quality::Video { max_height }) => write!(f, "video ({}p)", max_height),
            Mode::Single(Quality::Audio { bitrate_kbps }) => {
                write!(f, "audio ({}kbps)", bitrate_kbps)
            }
            Mode::Album { bitrate_kbps } => write!(f, "album ({}kbps)", bitrate_kbps),
        }
    }
}

/// Where cover art comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverArt {
    File(PathBuf),
    Url(String),
}

impl CoverArt {
    /// Interprets `source` as a URL when it has an http(s) scheme, as a file path otherwise.
    pub fn parse(source: &str) -> Self {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => CoverArt::Url(source.to_string()),
            _ => CoverArt::File(PathBuf::from(source)),
        }
    }
}

/// One user-initiated download request.
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    /// The folder the resolved output directory is placed under.
    pub base_dir: PathBuf,
    pub mode: Mode,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub cover: Option<CoverArt>,
    /// User-edited track titles, in playlist order.
    pub track_titles: Vec<String>,
}

impl Job {
    pub fn new(url: impl Into<String>, base_dir: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            url: url.into(),
            base_dir: base_dir.into(),
            mode,
            artist: None,
            album: None,
            year: None,
            cover: None,
            track_titles: Vec::new(),
        }
    }

    pub fn with_album_info(
        mut self,
        artist: impl Into<String>,
        album: impl Into<String>,
        year: Option<String>,
    ) -> Self {
        self.artist = Some(artist.into());
        self.album = Some(album.into());
        self.year = year;
        self
    }

    pub fn with_cover(mut self, cover: CoverArt) -> Self {
        self.cover = Some(cover);
        self
    }

    pub fn with_track_titles(mut self, titles: Vec<String>) -> Self {
        self.track_titles = titles;
        self
    }

    /// The trimmed artist, `None` when absent or blank.
    pub fn artist(&self) -> Option<&str> {
        non_blank(&self.artist)
    }

    pub fn album(&self) -> Option<&str> {
        non_blank(&self.album)
    }

    pub fn year(&self) -> Option<&str> {
        non_blank(&self.year)
    }

    /// Checks the fields that must be present before any I/O happens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`] for an empty or non-http(s) URL, and for
    /// album jobs without artist or album.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.url)?;

        if self.mode.is_album() && (self.artist().is_none() || self.album().is_none()) {
            return Err(Error::InvalidJob(
                "artist and album are required in album mode".to_string(),
            ));
        }

        Ok(())
    }
}

/// The terminal state of a job that did not fail.
#[derive(Debug)]
pub enum JobOutcome {
    /// Files were downloaded into `path`; album jobs also carry a tagging report.
    Completed {
        path: PathBuf,
        report: Option<TagReport>,
    },
    /// The user refused to write into an existing folder.
    Declined,
    /// The user stopped the job.
    Cancelled,
}

/// Accepts only absolute http(s) URLs.
pub fn validate_url(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidJob("the URL is empty".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| Error::InvalidJob(format!("'{}' is not a valid URL: {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(Error::InvalidJob(format!(
            "unsupported URL scheme '{}', expected http or https",
            scheme
        ))),
    }
}

/// Whether the URL points at a playlist (a `list` query parameter or a `/playlist` path).
pub fn is_playlist_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            parsed.query_pairs().any(|(key, _)| key == "list")
                || parsed.path().trim_end_matches('/').ends_with("/playlist")
        }
        Err(_) => url.contains("list="),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
