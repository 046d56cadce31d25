//! Output folder resolution and the overwrite gate.

use crate::downloader::{JobContext, JobEvent};
use crate::error::{Error, Result};
use crate::job::{Job, Mode, is_playlist_url};
use crate::youtube::Extractor;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

const UNKNOWN_PLAYLIST: &str = "Unknown Playlist";

/// The user's answer to "write into the existing folder?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Proceed,
    Declined,
    Cancelled,
}

/// Computes the folder a job downloads into.
///
/// Album jobs use `{base}/{artist} - {album}`. Single jobs on a playlist URL
/// use a subfolder named after the playlist; anything else downloads into
/// the base folder.
pub async fn resolve_output_dir<E>(job: &Job, extractor: &E) -> Result<PathBuf>
where
    E: Extractor + ?Sized,
{
    match job.mode {
        Mode::Album { .. } => {
            let (artist, album) = job.artist().zip(job.album()).ok_or_else(|| {
                Error::InvalidJob("artist and album are required in album mode".to_string())
            })?;
            Ok(job.base_dir.join(album_folder_name(artist, album)))
        }
        Mode::Single(_) if is_playlist_url(&job.url) => {
            let info = extractor.fetch_info(&job.url).await?;
            if !info.is_playlist() {
                return Ok(job.base_dir.clone());
            }

            let title = info.title.as_deref().unwrap_or(UNKNOWN_PLAYLIST);
            let folder = sanitize_folder_name(title);
            debug!("Playlist '{}' maps to folder '{}'", title, folder);
            if folder.is_empty() {
                Ok(job.base_dir.clone())
            } else {
                Ok(job.base_dir.join(folder))
            }
        }
        Mode::Single(_) => Ok(job.base_dir.clone()),
    }
}

/// `Artist - Album`, with path separators replaced so the name stays one folder.
pub fn album_folder_name(artist: &str, album: &str) -> String {
    replace_separators(&format!("{} - {}", artist.trim(), album.trim()))
}

/// Replaces `/` and `\` with `-` so `name` stays a single path component.
pub fn replace_separators(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect()
}

/// Keeps only alphanumeric characters and spaces.
pub fn sanitize_folder_name(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Creates `path` and its parents if needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(path)
        .map_err(|e| Error::Path(format!("cannot create {}: {}", path.display(), e)))
}

/// Asks the front-end whether to write into the existing `folder`.
///
/// The job waits for the reply or for cancellation, whichever comes first.
/// A front-end that drops the request without answering declines.
pub async fn confirm_overwrite(folder: &Path, ctx: &JobContext) -> OverwriteDecision {
    let (reply, decision) = oneshot::channel();
    ctx.emit(JobEvent::OverwriteRequested {
        folder: folder.to_path_buf(),
        reply,
    });

    let decision = tokio::select! {
        biased;
        _ = ctx.cancelled() => OverwriteDecision::Cancelled,
        answer = decision => match answer {
            Ok(true) => OverwriteDecision::Proceed,
            Ok(false) | Err(_) => OverwriteDecision::Declined,
        },
    };

    info!("Overwrite decision for {}: {:?}", folder.display(), decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn sanitizes_playlist_titles() {
        assert_eq!(sanitize_folder_name("My Mix: 2024/25 (Live!)"), "My Mix 202425 Live");
        assert_eq!(sanitize_folder_name("  Café Hits  "), "Café Hits");
        assert_eq!(sanitize_folder_name("!!!"), "");
    }

    #[test]
    fn album_folder_keeps_single_component() {
        assert_eq!(album_folder_name(" AC/DC ", "Back in Black"), "AC-DC - Back in Black");
    }

    #[test]
    fn ensure_dir_creates_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn ensure_dir_reports_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(ensure_dir(&file.join("sub")), Err(Error::Path(_))));
    }

    #[tokio::test]
    async fn gate_follows_the_reply() {
        for (answer, expected) in [
            (true, OverwriteDecision::Proceed),
            (false, OverwriteDecision::Declined),
        ] {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let ctx = JobContext::new(CancellationToken::new(), tx);

            let responder = tokio::spawn(async move {
                if let Some(JobEvent::OverwriteRequested { reply, .. }) = rx.recv().await {
                    let _ = reply.send(answer);
                }
            });

            assert_eq!(confirm_overwrite(Path::new("x"), &ctx).await, expected);
            responder.await.unwrap();
        }
    }

    #[tokio::test]
    async fn gate_declines_when_front_end_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let ctx = JobContext::new(CancellationToken::new(), tx);
        assert_eq!(
            confirm_overwrite(Path::new("x"), &ctx).await,
            OverwriteDecision::Declined
        );
    }

    #[tokio::test]
    async fn gate_stops_on_cancellation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let ctx = JobContext::new(cancel.clone(), tx);

        let waiter = tokio::spawn(async move { confirm_overwrite(Path::new("x"), &ctx).await });
        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), OverwriteDecision::Cancelled);
    }
}
