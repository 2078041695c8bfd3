//! Bounded-concurrency download execution.
//!
//! One engine runs one job at a time against its own [`StatusTracker`];
//! concurrent jobs belong on separate engine instances so their trackers
//! stay independent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fetch::{ByteStream, PageFetcher};
use crate::paths::{destination_exists, resolve_destination, series_root};
use crate::resolver::fetch_series_title;
use crate::status::{StatusSnapshot, StatusTracker};
use crate::utils::format_bytes;

/// One download request: which series page it belongs to, where to store the
/// files, and which episode URLs to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Series root page. The title is re-resolved from it when the job runs,
    /// since catalog build and download start may be separated in time.
    pub source_url: String,
    /// Download root; the series folder is created beneath it.
    pub folder: PathBuf,
    /// Episode URLs to fetch. Duplicates are collapsed.
    pub episodes: Vec<String>,
    /// Maximum simultaneous transfers. Must be at least 1.
    pub parallelism: usize,
}

/// A per-item failure in the job result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    pub path: PathBuf,
    pub reason: String,
}

/// What one job did: every requested item lands in exactly one bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobOutcome {
    pub downloaded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedItem>,
}

struct WorkItem {
    url: Url,
    dest: PathBuf,
    filename: String,
}

/// Executes download jobs over a fixed-size pool of concurrent transfers.
pub struct DownloadEngine {
    fetcher: Arc<dyn PageFetcher>,
    config: EngineConfig,
    tracker: Arc<StatusTracker>,
    cancel: CancellationToken,
}

impl DownloadEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: EngineConfig) -> Self {
        Self {
            fetcher,
            config,
            tracker: Arc::new(StatusTracker::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Shared handle to this engine's tracker, for pollers.
    pub fn tracker(&self) -> Arc<StatusTracker> {
        Arc::clone(&self.tracker)
    }

    /// Point-in-time copy of the job status.
    pub fn status(&self) -> StatusSnapshot {
        self.tracker.snapshot()
    }

    /// Request cancellation. In-flight items stop at their next chunk and are
    /// recorded as failures; the running job still completes with its three
    /// result buckets.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run a job on a background task and hand the caller the join handle, so
    /// the host can await, time out on, or drop it as it sees fit.
    pub fn spawn(self: &Arc<Self>, job: DownloadJob) -> JoinHandle<Result<JobOutcome>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run(job).await })
    }

    /// Execute a job to completion.
    ///
    /// Already-present destinations are skipped and counted as successes.
    /// Transfer failures are per-item and never abort siblings. The existence
    /// check here and a concurrent job writing the same destination can still
    /// race; destinations are only guaranteed stable within one engine.
    pub async fn run(&self, job: DownloadJob) -> Result<JobOutcome> {
        if job.parallelism == 0 {
            return Err(EngineError::configuration(
                "parallelism must be at least 1",
            ));
        }

        let source_url = Url::parse(&job.source_url)
            .map_err(|e| EngineError::invalid_url(&job.source_url, e.to_string()))?;

        // The title is fetched fresh rather than taken from a catalog built
        // earlier; the site may have changed in between.
        let title = fetch_series_title(self.fetcher.as_ref(), &source_url).await;
        let root = series_root(&job.folder, &title);

        info!(
            title = %title,
            root = %root.display(),
            requested = job.episodes.len(),
            parallelism = job.parallelism,
            "Starting download job"
        );

        let mut outcome = JobOutcome::default();
        let mut items = Vec::new();
        let mut invalid = Vec::new();
        let mut seen = HashSet::new();
        for raw in &job.episodes {
            if !seen.insert(raw.as_str()) {
                continue;
            }
            match Url::parse(raw) {
                Ok(url) => {
                    let (dest, _) = resolve_destination(&root, &url);
                    let filename = dest
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_else(|| raw.clone());
                    items.push(WorkItem {
                        url,
                        dest,
                        filename,
                    });
                }
                Err(e) => invalid.push((raw.clone(), e.to_string())),
            }
        }

        self.tracker.reset(items.iter().map(|i| i.filename.clone()));
        for (raw, reason) in invalid {
            let message = format!("invalid URL: {reason}");
            self.tracker.mark_failed(&raw, &message);
            outcome.failed.push(FailedItem {
                path: PathBuf::from(&raw),
                reason: message,
            });
        }

        // Re-check existence now; any `already_present` flag from the catalog
        // is advisory only.
        let mut work = Vec::new();
        for item in items {
            if destination_exists(&item.dest) {
                debug!(path = %item.dest.display(), "Already present, skipping");
                self.tracker.mark_completed(&item.filename);
                outcome.skipped.push(item.dest);
            } else {
                work.push(item);
            }
        }

        let semaphore = Arc::new(Semaphore::new(job.parallelism));
        let mut tasks = JoinSet::new();
        for item in work {
            let fetcher = Arc::clone(&self.fetcher);
            let tracker = Arc::clone(&self.tracker);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let buffer_size = self.config.buffer_size;
            tasks.spawn(async move {
                // Queued items wait here without holding a worker slot.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let message = "admission gate closed".to_string();
                        tracker.mark_failed(&item.filename, &message);
                        return (item, Err(message));
                    }
                };

                if cancel.is_cancelled() {
                    let message = EngineError::Cancelled.to_string();
                    tracker.mark_failed(&item.filename, &message);
                    return (item, Err(message));
                }

                tracker.mark_downloading(&item.filename);
                match transfer(fetcher.as_ref(), &item, buffer_size, &cancel).await {
                    Ok(bytes) => {
                        info!(
                            path = %item.dest.display(),
                            size = %format_bytes(bytes),
                            "Download finished"
                        );
                        tracker.mark_completed(&item.filename);
                        (item, Ok(()))
                    }
                    Err(e) => {
                        let message = e.to_string();
                        warn!(path = %item.dest.display(), error = %message, "Download failed");
                        tracker.mark_failed(&item.filename, &message);
                        (item, Err(message))
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((item, Ok(()))) => outcome.downloaded.push(item.dest),
                Ok((item, Err(reason))) => outcome.failed.push(FailedItem {
                    path: item.dest,
                    reason,
                }),
                Err(e) => warn!(error = %e, "Download task panicked"),
            }
        }

        self.tracker.finish();
        info!(
            downloaded = outcome.downloaded.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Download job finished"
        );
        Ok(outcome)
    }
}

/// Stream one media URL to its destination.
///
/// A single attempt: no retry on failure. The bytes go to a `.part` sibling
/// first and are renamed into place at the end, so an interrupted transfer
/// never looks like a finished episode to the existence check.
async fn transfer(
    fetcher: &dyn PageFetcher,
    item: &WorkItem,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut stream = fetcher.open_stream(&item.url).await?;

    if let Some(parent) = item.dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let part = part_path(&item.dest);
    match write_stream(&mut stream, &part, buffer_size, cancel).await {
        Ok(written) => {
            fs::rename(&part, &item.dest).await?;
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&part).await;
            Err(e)
        }
    }
}

async fn write_stream(
    stream: &mut ByteStream,
    part: &Path,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    let file = fs::File::create(part).await?;
    let mut writer = BufWriter::with_capacity(buffer_size, file);
    let mut written = 0u64;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|f| f.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
