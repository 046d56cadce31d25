use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use tokio_util::sync::CancellationToken;
use log::{LevelFilter, error, info, warn};
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use ytalbum::{
    Config, CoverArt, Downloader, Extractor, Job, JobEvent, JobOutcome, JobRunner, Libraries,
    Mode, ProgressStatus, Quality, YtDlp, deps, validate_url,
    job::{AUDIO_BITRATES, VIDEO_HEIGHTS},
};

#[derive(Parser)]
#[command(version, about = "Download videos and playlists, or turn a playlist into a tagged MP3 album.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        long = "verbosity",
        short,
        global = true,
        default_value = "info",
        value_parser = clap::builder::PossibleValuesParser::new([
            "info", "debug", "error", "none", "full"
        ])
    )]
    pub verbosity: String,

    /// Config file to use instead of the default location.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download a video or playlist.
    Download(DownloadArgs),
    /// Show the title, thumbnail and entries of a link without downloading.
    Info(InfoArgs),
}

#[derive(Args, Clone)]
pub struct DownloadArgs {
    pub url: String,

    #[arg(long = "output-dir", short)]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long = "mode",
        short,
        default_value = "video",
        value_parser = clap::builder::PossibleValuesParser::new(["video", "audio", "album"])
    )]
    pub mode: String,

    /// Maximum video height; defaults to the configured height.
    #[arg(
        long = "height",
        value_parser = clap::builder::PossibleValuesParser::new(["1080p", "720p", "480p", "360p"])
    )]
    pub height: Option<String>,

    /// MP3 bitrate for audio and album modes; defaults to the configured bitrate.
    #[arg(
        long = "bitrate",
        short,
        value_parser = clap::builder::PossibleValuesParser::new(["320k", "192k", "128k"])
    )]
    pub bitrate: Option<String>,

    #[arg(long = "artist")]
    pub artist: Option<String>,

    #[arg(long = "album")]
    pub album: Option<String>,

    #[arg(long = "year")]
    pub year: Option<String>,

    /// Cover art image, as a file path or an http(s) URL.
    #[arg(long = "cover", conflicts_with = "thumbnail_cover")]
    pub cover: Option<String>,

    /// Use the link's thumbnail as cover art.
    #[arg(long = "thumbnail-cover", action = clap::ArgAction::SetTrue)]
    pub thumbnail_cover: bool,

    /// File with one track title per line, in playlist order.
    #[arg(long = "titles")]
    pub titles: Option<PathBuf>,

    /// Write into an existing output folder without asking.
    #[arg(long = "yes", short = 'y', action = clap::ArgAction::SetTrue)]
    pub yes: bool,
}

#[derive(Args, Clone)]
pub struct InfoArgs {
    pub url: String,

    /// Write the cleaned entry titles here, ready to edit and pass to `--titles`.
    #[arg(long = "titles-out")]
    pub titles_out: Option<PathBuf>,

    /// Artist name stripped from the written titles.
    #[arg(long = "artist")]
    pub artist: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let multi = MultiProgress::new();
    init_logging(&multi, &cli.verbosity);

    if let Err(e) = run(cli, multi).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(multi: &MultiProgress, verbosity: &str) {
    let level = match verbosity {
        "full" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "error" => LevelFilter::Error,
        "none" => LevelFilter::Off,
        _ => LevelFilter::Info,
    };

    let logger = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .build();
    let max_level = logger.filter();
    if LogWrapper::new(multi.clone(), logger).try_init().is_ok() {
        log::set_max_level(max_level);
    }
}

async fn run(cli: Cli, multi: MultiProgress) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_or_create(&config_path)?;

    match cli.command {
        Command::Info(args) => show_info(&config, args).await,
        Command::Download(args) => download(&config, args, multi).await,
    }
}

async fn show_info(
    config: &Config,
    args: InfoArgs,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    validate_url(&args.url)?;
    let youtube = deps::locate_youtube(config.ytdlp_path.as_deref())?;
    let extractor = YtDlp::new(Libraries::new(youtube, PathBuf::new()));

    info!("Fetching Info...");
    let media = extractor.fetch_info(&args.url).await?;
    let (title, thumbnail) = media.preview();
    println!("Title:     {}", title.unwrap_or("Unknown"));
    println!("Thumbnail: {}", thumbnail.unwrap_or("-"));

    if media.is_playlist() {
        println!(
            "Playlist:  {} ({} entries)",
            media.title.as_deref().unwrap_or("Unknown Playlist"),
            media.entries.len()
        );

        let cleaner = config.title_cleaner()?;
        let artist = args.artist.as_deref().unwrap_or("");
        let titles = media
            .entries
            .iter()
            .map(|entry| cleaner.clean(entry.title.as_deref().unwrap_or(""), artist, None))
            .collect::<Vec<_>>();
        for (i, title) in titles.iter().enumerate() {
            println!("{:>4}. {}", i + 1, title);
        }

        if let Some(path) = args.titles_out {
            fs::write(&path, titles.join("\n") + "\n")?;
            println!("Track titles written to: {}", path.display());
        }
    } else if args.titles_out.is_some() {
        warn!("Not a playlist, no track titles written");
    }

    Ok(())
}

async fn download(
    config: &Config,
    args: DownloadArgs,
    multi: MultiProgress,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let libraries = Libraries::locate(config.ytdlp_path.as_deref(), config.ffmpeg_dir.as_deref())
        .map_err(|e| format!("CRITICAL ERROR: {}", e))?;

    let mut job = build_job(config, &args)?;
    job.validate()?;

    let ffmpeg_dir = libraries.ffmpeg_dir();
    let extractor = YtDlp::new(libraries);
    if args.thumbnail_cover {
        job.cover = thumbnail_cover(&extractor, &job.url).await;
    }
    info!("Downloading {} as {}", job.url, job.mode);

    let downloader = Downloader::new(JobRunner::new(extractor, ffmpeg_dir, config.title_cleaner()?));
    let mut handle = downloader
        .start(job)
        .ok_or("A download is already running")?;

    let bar = multi.add(ProgressBar::new(100));
    bar.set_style(
        ProgressStyle::with_template("{bar:40.red/white} {pos:>3}% {msg}")?.progress_chars("##-"),
    );

    let cancel = handle.cancel_token();
    let stop_bar = bar.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel, stop_bar.clone()).await {
            stop_bar.abandon_with_message("Aborted");
            std::process::exit(130);
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Status(text) => {
                info!("{}", text);
                bar.set_message(text);
            }
            JobEvent::Progress(progress) => {
                if let Some(fraction) = progress.fraction() {
                    bar.set_position((fraction * 100.0).round() as u64);
                }
                let message = match progress.detail_text() {
                    Some(detail) => format!("{} {}", progress.status_text(), detail),
                    None => progress.status_text(),
                };
                if progress.status == ProgressStatus::Finished {
                    bar.set_position(100);
                }
                bar.set_message(message);
            }
            JobEvent::OverwriteRequested { folder, reply } => {
                let answer = args.yes
                    || tokio::task::block_in_place(|| bar.suspend(|| ask_overwrite(&folder)));
                let _ = reply.send(answer);
            }
        }
    }
    bar.finish_and_clear();

    match handle.wait().await? {
        JobOutcome::Completed { path, report } => {
            println!("Complete! Files saved in {}", path.display());
            if let Some(report) = report {
                println!(
                    "Tagged {} track(s), {} failed.",
                    report.tagged.len(),
                    report.failed.len()
                );
                for (file, reason) in &report.failed {
                    println!("  {}: {}", file.display(), reason);
                }
            }
        }
        JobOutcome::Declined => println!("Download Cancelled"),
        JobOutcome::Cancelled => println!("Cancelled"),
    }

    Ok(())
}

fn build_job(
    config: &Config,
    args: &DownloadArgs,
) -> Result<Job, Box<dyn std::error::Error + Send + Sync>> {
    let bitrate = match &args.bitrate {
        Some(bitrate) => bitrate.trim_end_matches('k').parse::<u32>()?,
        None => config.audio_bitrate,
    };
    let height = match &args.height {
        Some(height) => height.trim_end_matches('p').parse::<u32>()?,
        None => config.video_height,
    };

    if !VIDEO_HEIGHTS.contains(&height) {
        warn!("Unusual video height {}p, offered heights are {:?}", height, VIDEO_HEIGHTS);
    }
    if !AUDIO_BITRATES.contains(&bitrate) {
        warn!("Unusual bitrate {}k, offered bitrates are {:?}", bitrate, AUDIO_BITRATES);
    }

    let mode = match args.mode.as_str() {
        "album" => Mode::Album {
            bitrate_kbps: bitrate,
        },
        "audio" => Mode::Single(Quality::Audio {
            bitrate_kbps: bitrate,
        }),
        _ => Mode::Single(Quality::Video { max_height: height }),
    };

    let base_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.download_dir.clone());

    let mut job = Job::new(args.url.trim(), base_dir, mode);
    job.artist = args.artist.clone();
    job.album = args.album.clone();
    job.year = args.year.clone();
    if let Some(cover) = &args.cover {
        job = job.with_cover(CoverArt::parse(cover));
    }
    if let Some(path) = &args.titles {
        job = job.with_track_titles(read_titles(path)?);
    }

    Ok(job)
}

fn read_titles(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(|line| line.trim().to_string())
        .collect())
}

async fn thumbnail_cover(extractor: &YtDlp, url: &str) -> Option<CoverArt> {
    match extractor.fetch_info(url).await {
        Ok(media) => {
            let thumbnail = media.thumbnail.as_deref().or(media.preview().1);
            thumbnail.map(|url| CoverArt::Url(url.to_string()))
        }
        Err(e) => {
            warn!("Could not load preview: {}", e);
            None
        }
    }
}

/// The first interrupt cancels the job; returns `true` on a second one.
async fn watch_interrupts<F, Fut>(
    mut interrupted: F,
    cancel: CancellationToken,
    bar: ProgressBar,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if interrupted().await.is_err() {
        return false;
    }
    bar.set_message("Stopping...");
    warn!("Stopping, press Ctrl-C again to quit immediately");
    cancel.cancel();

    interrupted().await.is_ok()
}

fn ask_overwrite(folder: &Path) -> bool {
    let name = folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.display().to_string());

    let mut answer = String::new();
    loop {
        print!(
            "The folder '{}' already exists. Write into it (merge/overwrite)? [y/N]: ",
            name
        );
        if std::io::stdout().flush().is_err() {
            return false;
        }
        answer.clear();
        match std::io::stdin().read_line(&mut answer) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return true,
            "" | "n" | "no" => return false,
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{Mutex, mpsc};

    fn interrupts() -> (
        mpsc::UnboundedSender<()>,
        impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let next = move || {
            let rx = rx.clone();
            Box::pin(async move {
                rx.lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| std::io::Error::other("signal handler gone"))
            }) as std::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>
        };
        (tx, next)
    }

    #[tokio::test]
    async fn first_interrupt_cancels_and_second_quits() {
        let (tx, next) = interrupts();
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_interrupts(next, cancel.clone(), ProgressBar::hidden()));

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
        assert!(!watcher.is_finished());

        tx.send(()).unwrap();
        assert!(watcher.await.unwrap());
    }

    #[tokio::test]
    async fn broken_signal_handler_does_nothing() {
        let (tx, next) = interrupts();
        drop(tx);
        let cancel = CancellationToken::new();

        assert!(!watch_interrupts(next, cancel.clone(), ProgressBar::hidden()).await);
        assert!(!cancel.is_cancelled());
    }
}
