//! Download videos and playlists through yt-dlp and turn playlists into
//! tagged MP3 albums.
//!
//! ```rust,no_run
//! use ytalbum::{Downloader, Job, JobEvent, JobRunner, Libraries, Mode, TitleCleaner, YtDlp};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let libraries = Libraries::locate(None, None)?;
//! let ffmpeg_dir = libraries.ffmpeg_dir();
//! let downloader = Downloader::new(JobRunner::new(
//!     YtDlp::new(libraries),
//!     ffmpeg_dir,
//!     TitleCleaner::default(),
//! ));
//!
//! let job = Job::new(
//!     "https://www.youtube.com/playlist?list=PL0123456789",
//!     "music",
//!     Mode::Album { bitrate_kbps: 192 },
//! )
//! .with_album_info("Artist", "Album", Some("1999".to_string()));
//!
//! let mut handle = downloader.start(job).expect("no other job is running");
//! while let Some(event) = handle.next_event().await {
//!     if let JobEvent::Status(text) = event {
//!         println!("{text}");
//!     }
//! }
//! println!("{:?}", handle.wait().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deps;
pub mod downloader;
pub mod error;
pub mod executor;
pub mod job;
pub mod metadata;
pub mod paths;
pub mod progress;
pub mod title;
pub mod youtube;

pub use config::Config;
pub use deps::Libraries;
pub use downloader::{Downloader, JobContext, JobEvent, JobHandle, JobRunner};
pub use error::{Error, Result};
pub use job::{CoverArt, Job, JobOutcome, Mode, Quality, is_playlist_url, validate_url};
pub use metadata::{AlbumTags, TagReport, TaggedTrack, tag_album};
pub use progress::{ProgressEvent, ProgressStatus};
pub use title::TitleCleaner;
pub use youtube::{DownloadRequest, EntryInfo, Extractor, MediaInfo, MediaKind, YtDlp};
