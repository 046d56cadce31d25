//! Runs one job at a time on a background task.
//!
//! The front-end starts a job with [`Downloader::start`] and then drains
//! [`JobEvent`]s from the returned [`JobHandle`] until the worker is done:
//! status lines, progress updates and the overwrite question. Stopping is
//! cooperative through the handle's cancellation token.

use crate::error::{Error, Result};
use crate::job::{CoverArt, Job, JobOutcome};
use crate::metadata::{self, AlbumTags, TagReport};
use crate::paths::{self, OverwriteDecision};
use crate::progress::ProgressEvent;
use crate::title::TitleCleaner;
use crate::youtube::{DownloadRequest, Extractor};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::WaitForCancellationFuture;

/// Something the front-end should show or answer.
#[derive(Debug)]
pub enum JobEvent {
    /// A new status line.
    Status(String),
    Progress(ProgressEvent),
    /// The output folder exists; reply `true` to write into it.
    OverwriteRequested {
        folder: PathBuf,
        reply: oneshot::Sender<bool>,
    },
}

/// Per-job state shared with the worker: the stop signal and the event sink.
#[derive(Debug, Clone)]
pub struct JobContext {
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl JobContext {
    pub fn new(cancel: CancellationToken, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { cancel, events }
    }

    /// Sends `event`; a front-end that stopped listening is ignored.
    pub fn emit(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(JobEvent::Status(text.into()));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// The job pipeline: validate, resolve the folder, gate, download, tag.
pub struct JobRunner<E> {
    extractor: E,
    ffmpeg_dir: PathBuf,
    cleaner: TitleCleaner,
    http: reqwest::Client,
}

impl<E: Extractor> JobRunner<E> {
    pub fn new(extractor: E, ffmpeg_dir: PathBuf, cleaner: TitleCleaner) -> Self {
        Self {
            extractor,
            ffmpeg_dir,
            cleaner,
            http: reqwest::Client::new(),
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Runs `job` to a terminal state.
    ///
    /// # Errors
    ///
    /// Invalid jobs fail before any I/O. Folder creation, playlist lookup and
    /// download failures end the job with an error; tagging failures are per
    /// file and end up in the report instead.
    pub async fn run(&self, job: Job, ctx: &JobContext) -> Result<JobOutcome> {
        if let Err(e) = job.validate() {
            ctx.status(format!("Error: {}", e));
            return Err(e);
        }

        ctx.status("Checking Paths...");
        paths::ensure_dir(&job.base_dir)?;

        let output_dir = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Ok(self.cancelled(ctx)),
            resolved = paths::resolve_output_dir(&job, &self.extractor) => match resolved {
                Ok(dir) => dir,
                Err(e) => {
                    error!("Pre-download error: {}", e);
                    ctx.status("Error fetching info");
                    return Err(e);
                }
            },
        };

        if output_dir.exists() {
            match paths::confirm_overwrite(&output_dir, ctx).await {
                OverwriteDecision::Proceed => {}
                OverwriteDecision::Declined => {
                    ctx.status("Download Cancelled");
                    return Ok(JobOutcome::Declined);
                }
                OverwriteDecision::Cancelled => return Ok(self.cancelled(ctx)),
            }
        }
        paths::ensure_dir(&output_dir)?;

        ctx.status("Starting Download...");
        let request = DownloadRequest::new(&job, &output_dir, &self.ffmpeg_dir);
        let progress_ctx = ctx.clone();
        let on_progress = move |event: ProgressEvent| {
            progress_ctx.emit(JobEvent::Progress(event));
        };

        match self
            .extractor
            .download(&request, &on_progress, ctx.cancel_token())
            .await
        {
            Ok(()) => {}
            Err(_) if ctx.is_cancelled() => return Ok(self.cancelled(ctx)),
            Err(e) => {
                error!("Download failed: {}", e);
                ctx.status("Error: Check Console");
                return Err(e);
            }
        }

        let report = if job.mode.is_album() {
            ctx.status("Tagging & Renaming...");
            let report = self.tag_album(&job, &output_dir).await?;
            ctx.status("Album Complete!");
            Some(report)
        } else {
            ctx.status("Complete!");
            None
        };

        info!("Job finished, files saved in {}", output_dir.display());
        Ok(JobOutcome::Completed {
            path: output_dir,
            report,
        })
    }

    fn cancelled(&self, ctx: &JobContext) -> JobOutcome {
        ctx.status("Cancelled");
        JobOutcome::Cancelled
    }

    async fn tag_album(&self, job: &Job, folder: &Path) -> Result<TagReport> {
        let cover = match &job.cover {
            Some(cover) => match self.load_cover(cover).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Skipping cover art: {}", e);
                    None
                }
            },
            None => None,
        };

        let tags = AlbumTags {
            artist: job.artist().map(str::to_string),
            album: job.album().map(str::to_string),
            year: job.year().map(str::to_string),
            cover,
        };
        let cleaner = self
            .cleaner
            .clone()
            .with_replacements(job.track_titles.clone());
        let folder = folder.to_path_buf();

        tokio::task::spawn_blocking(move || metadata::tag_album(&folder, &tags, &cleaner)).await?
    }

    async fn load_cover(&self, cover: &CoverArt) -> Result<Vec<u8>> {
        match cover {
            CoverArt::File(path) => Ok(tokio::fs::read(path).await?),
            CoverArt::Url(url) => {
                let response = self.http.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

/// Starts jobs, refusing a new one while another is in flight.
pub struct Downloader<E> {
    runner: Arc<JobRunner<E>>,
    busy: Arc<AtomicBool>,
}

impl<E: Extractor + 'static> Downloader<E> {
    pub fn new(runner: JobRunner<E>) -> Self {
        Self {
            runner: Arc::new(runner),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn runner(&self) -> &JobRunner<E> {
        &self.runner
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Spawns `job` on the tokio runtime.
    ///
    /// Returns `None` without doing anything when a job is already running.
    pub fn start(&self, job: Job) -> Option<JobHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("A download is already running, ignoring the new request");
            return None;
        }

        let guard = BusyGuard(self.busy.clone());
        let (events_tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let ctx = JobContext::new(cancel.clone(), events_tx);
        let runner = self.runner.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            runner.run(job, &ctx).await
        });

        Some(JobHandle {
            cancel,
            events,
            task,
        })
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The front-end's view of a running job.
pub struct JobHandle {
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<JobEvent>,
    task: JoinHandle<Result<JobOutcome>>,
}

impl JobHandle {
    /// Requests a stop; the job ends as [`JobOutcome::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The next event, or `None` once the worker has finished.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Waits for the worker and returns its terminal state.
    pub async fn wait(self) -> Result<JobOutcome> {
        drop(self.events);
        self.task.await.map_err(Error::from)?
    }
}
