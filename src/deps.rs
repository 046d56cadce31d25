//! Locating the external binaries a download needs.

use crate::error::{Error, Result};
use log::debug;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Directory, relative to the working directory, where ffmpeg is expected by default.
pub const DEFAULT_FFMPEG_DIR: &str = ".";

/// The located binaries.
///
/// # Examples
///
/// ```rust,no_run
/// # use ytalbum::deps::Libraries;
/// # use std::path::PathBuf;
/// let destination = PathBuf::from("libs");
///
/// let youtube = destination.join("yt-dlp");
/// let ffmpeg = destination.join("ffmpeg");
///
/// let libraries = Libraries::new(youtube, ffmpeg);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Libraries {
    /// The path to the yt-dlp binary.
    pub youtube: PathBuf,
    /// The path to the ffmpeg binary.
    pub ffmpeg: PathBuf,
}

impl Libraries {
    pub fn new(youtube: PathBuf, ffmpeg: PathBuf) -> Self {
        Self { youtube, ffmpeg }
    }

    /// Finds both binaries.
    ///
    /// yt-dlp comes from `youtube` when given, otherwise from `PATH`. ffmpeg
    /// must sit in `ffmpeg_dir` (default: the working directory).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBinary`] for the first binary that cannot be found.
    pub fn locate(youtube: Option<&Path>, ffmpeg_dir: Option<&Path>) -> Result<Self> {
        Ok(Self::new(locate_youtube(youtube)?, locate_ffmpeg(ffmpeg_dir)?))
    }

    /// The directory passed to yt-dlp's `--ffmpeg-location`.
    pub fn ffmpeg_dir(&self) -> PathBuf {
        match self.ffmpeg.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from(DEFAULT_FFMPEG_DIR),
        }
    }
}

/// Finds yt-dlp at `configured`, or on `PATH`.
pub fn locate_youtube(configured: Option<&Path>) -> Result<PathBuf> {
    let name = find_executable("yt-dlp");

    if let Some(path) = configured {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::MissingBinary {
                name,
                path: path.to_path_buf(),
            })
        };
    }

    search_path("yt-dlp", env::var_os("PATH"))
}

/// Finds ffmpeg inside `dir`, falling back to the working directory.
pub fn locate_ffmpeg(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir()?.join(DEFAULT_FFMPEG_DIR),
    };

    let name = find_executable("ffmpeg");
    let path = dir.join(&name);
    debug!("Looking for ffmpeg at {}", path.display());

    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingBinary { name, path })
    }
}

/// Appends the platform executable extension to `name`.
pub fn find_executable(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Finds an executable `name` in `paths`, honouring the executable bit and `PATHEXT`.
fn search_path(name: &str, paths: Option<OsString>) -> Result<PathBuf> {
    let cwd = env::current_dir()?;
    which::which_in(name, paths, cwd).map_err(|e| {
        debug!("{} not found on PATH: {}", name, e);
        let name = find_executable(name);
        Error::MissingBinary {
            path: PathBuf::from(&name),
            name,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_ffmpeg_in_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(find_executable("ffmpeg"));
        fs::write(&path, b"").unwrap();

        assert_eq!(locate_ffmpeg(Some(dir.path())).unwrap(), path);
    }

    #[test]
    fn missing_ffmpeg_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        match locate_ffmpeg(Some(dir.path())) {
            Err(Error::MissingBinary { path, .. }) => {
                assert_eq!(path, dir.path().join(find_executable("ffmpeg")))
            }
            other => panic!("expected a missing binary error, got {other:?}"),
        }
    }

    #[test]
    fn configured_youtube_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            locate_youtube(Some(&missing)),
            Err(Error::MissingBinary { .. })
        ));

        let present = dir.path().join("yt-dlp");
        fs::write(&present, b"").unwrap();
        assert_eq!(locate_youtube(Some(&present)).unwrap(), present);
    }

    #[cfg(unix)]
    #[test]
    fn path_search_skips_files_that_cannot_run() {
        use std::os::unix::fs::PermissionsExt;

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let plain = first.path().join("yt-dlp");
        fs::write(&plain, b"").unwrap();
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).unwrap();
        let runnable = second.path().join("yt-dlp");
        fs::write(&runnable, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&runnable, fs::Permissions::from_mode(0o755)).unwrap();

        let paths = env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(search_path("yt-dlp", Some(paths)).unwrap(), runnable);
    }

    #[test]
    fn path_search_reports_missing_binary() {
        let empty = tempfile::tempdir().unwrap();
        let paths = env::join_paths([empty.path()]).unwrap();
        assert!(matches!(
            search_path("yt-dlp", Some(paths)),
            Err(Error::MissingBinary { .. })
        ));
    }

    #[test]
    fn ffmpeg_dir_is_parent_of_binary() {
        let libraries = Libraries::new(
            PathBuf::from("/usr/bin/yt-dlp"),
            PathBuf::from("/opt/tools/ffmpeg"),
        );
        assert_eq!(libraries.ffmpeg_dir(), PathBuf::from("/opt/tools"));

        let bare = Libraries::new(PathBuf::from("yt-dlp"), PathBuf::from("ffmpeg"));
        assert_eq!(bare.ffmpeg_dir(), PathBuf::from("."));
    }
}
