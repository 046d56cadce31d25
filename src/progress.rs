//! Progress events reported by yt-dlp.
//!
//! yt-dlp is started with a `--progress-template` that prints one
//! machine-readable line per update:
//!
//! ```text
//! ytalbum|downloading| 42.0%|1.21MiB/s|00:13|Song Title
//! ```
//!
//! Post-processing steps (audio extraction, merging) are recognised from
//! yt-dlp's regular `[ExtractAudio]` / `[Merger]` lines.

/// Marker that starts every templated progress line.
pub const PROGRESS_MARKER: &str = "ytalbum";

/// The template handed to `--progress-template`.
pub fn progress_template() -> String {
    format!(
        "download:{}|%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(info.title)s",
        PROGRESS_MARKER
    )
}

/// The stage an item is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    /// The item's download finished; post-processing may follow.
    Finished,
    /// ffmpeg is extracting or merging streams.
    Processing,
    Error,
}

/// One progress update for the item currently being downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    /// Percentage in `0.0..=100.0`.
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    /// Title of the item being downloaded.
    pub title: Option<String>,
}

impl ProgressEvent {
    pub fn processing() -> Self {
        Self {
            status: ProgressStatus::Processing,
            percent: None,
            speed: None,
            eta: None,
            title: None,
        }
    }

    /// The main status line shown to the user.
    pub fn status_text(&self) -> String {
        match self.status {
            ProgressStatus::Downloading => {
                let title = self.title.as_deref().unwrap_or("Unknown");
                let short: String = title.chars().take(30).collect();
                format!("Downloading: {}...", short)
            }
            ProgressStatus::Finished | ProgressStatus::Processing => "Processing...".to_string(),
            ProgressStatus::Error => "Download error".to_string(),
        }
    }

    /// The secondary line with speed and ETA, only while downloading.
    pub fn detail_text(&self) -> Option<String> {
        if self.status != ProgressStatus::Downloading {
            return None;
        }

        Some(format!(
            "Speed: {} | ETA: {}",
            self.speed.as_deref().unwrap_or("?"),
            self.eta.as_deref().unwrap_or("?")
        ))
    }

    /// Progress as a fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> Option<f64> {
        self.percent.map(|p| (p / 100.0).clamp(0.0, 1.0))
    }
}

/// Parses one line of yt-dlp stdout into an event, if it carries progress.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        let mut fields = rest.strip_prefix('|')?.splitn(5, '|');
        let status = match fields.next()?.trim() {
            "downloading" => ProgressStatus::Downloading,
            "finished" => ProgressStatus::Finished,
            "error" => ProgressStatus::Error,
            _ => return None,
        };
        let percent = available(fields.next())
            .and_then(|p| p.trim_end_matches('%').trim().parse::<f64>().ok());
        let speed = available(fields.next()).map(str::to_string);
        let eta = available(fields.next()).map(str::to_string);
        let title = available(fields.next()).map(str::to_string);

        return Some(ProgressEvent {
            status,
            percent,
            speed,
            eta,
            title,
        });
    }

    if line.starts_with("[ExtractAudio]") || line.starts_with("[Merger]") {
        return Some(ProgressEvent::processing());
    }

    None
}

fn available(field: Option<&str>) -> Option<&str> {
    field
        .map(str::trim)
        .filter(|value| !value.is_empty() && !matches!(*value, "NA" | "N/A" | "Unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_downloading_line() {
        let event = parse_line("ytalbum|downloading| 42.5%|1.21MiB/s|00:13|My | Song").unwrap();
        assert_eq!(event.status, ProgressStatus::Downloading);
        assert_eq!(event.percent, Some(42.5));
        assert_eq!(event.speed.as_deref(), Some("1.21MiB/s"));
        assert_eq!(event.eta.as_deref(), Some("00:13"));
        assert_eq!(event.title.as_deref(), Some("My | Song"));
        assert_eq!(event.fraction(), Some(0.425));
    }

    #[test]
    fn missing_values_become_none() {
        let event = parse_line("ytalbum|finished|100%|NA|NA|Song").unwrap();
        assert_eq!(event.status, ProgressStatus::Finished);
        assert_eq!(event.speed, None);
        assert_eq!(event.eta, None);
        assert_eq!(event.status_text(), "Processing...");
        assert_eq!(event.detail_text(), None);
    }

    #[test]
    fn recognises_post_processing() {
        let event = parse_line("[ExtractAudio] Destination: out/01-Song.mp3").unwrap();
        assert_eq!(event.status, ProgressStatus::Processing);
        assert!(parse_line("[Merger] Merging formats into \"x.mp4\"").is_some());
    }

    #[test]
    fn ignores_other_output() {
        assert!(parse_line("[youtube] Extracting URL: https://example.com").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("ytalbum|bogus|1%|a|b|c").is_none());
    }

    #[test]
    fn status_text_truncates_title() {
        let event = ProgressEvent {
            status: ProgressStatus::Downloading,
            percent: Some(1.0),
            speed: Some("2MiB/s".into()),
            eta: None,
            title: Some("A very long title that keeps going and going".into()),
        };
        assert_eq!(
            event.status_text(),
            "Downloading: A very long title that keeps g..."
        );
        assert_eq!(event.detail_text().unwrap(), "Speed: 2MiB/s | ETA: ?");
    }
}
