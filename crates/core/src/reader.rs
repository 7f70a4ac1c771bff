use crate::error::{FileFailure, SortError};
use crate::exif_reader::read_image_metadata;
use crate::metadata::ImageRecord;
use crate::progress::{CancellationToken, ProgressFn, ProgressTracker};
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadOutcome {
    /// Successfully read images, in scan order.
    pub records: Vec<ImageRecord>,
    /// Distinct non-empty camera models among `records`.
    pub camera_models: BTreeSet<String>,
    /// Files excluded from `records`, sorted by path.
    pub failures: Vec<FileFailure>,
}

impl ReadOutcome {
    pub fn total(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Reads metadata for every path on a pool of `workers` threads
/// (`None` means one per available processor).
pub fn read_images(
    paths: Vec<PathBuf>,
    workers: Option<usize>,
    progress: &ProgressFn<'_>,
    cancel: &CancellationToken,
) -> Result<ReadOutcome, SortError> {
    read_images_with(paths, workers, read_image_metadata, progress, cancel)
}

/// [`read_images`] with a caller-supplied extractor.
///
/// Each task sends its result back over a channel tagged with the path's scan
/// index; only the calling thread touches the collection and the progress sink.
/// Completion order is therefore irrelevant: records come back in scan order.
pub fn read_images_with<F>(
    paths: Vec<PathBuf>,
    workers: Option<usize>,
    extract: F,
    progress: &ProgressFn<'_>,
    cancel: &CancellationToken,
) -> Result<ReadOutcome, SortError>
where
    F: Fn(&Path) -> Result<ImageRecord, SortError> + Send + Sync + 'static,
{
    let total = paths.len();
    let mut outcome = ReadOutcome::default();
    if total == 0 {
        return Ok(outcome);
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(0))
        .thread_name(|i| format!("imgsort-read-{i}"))
        .build()
        .map_err(|err| SortError::WorkerPool {
            reason: err.to_string(),
        })?;
    info!(files = total, workers = pool.current_num_threads(), "reading metadata");
    let started = Instant::now();

    let extract = Arc::new(extract);
    let (tx, rx) = mpsc::channel::<(usize, PathBuf, Option<Result<ImageRecord, SortError>>)>();
    for (index, path) in paths.into_iter().enumerate() {
        let tx = tx.clone();
        let extract = Arc::clone(&extract);
        let cancel = cancel.clone();
        pool.spawn(move || {
            let result = if cancel.is_cancelled() {
                None
            } else {
                Some(extract(&path))
            };
            // The receiver outlives every task; a send error means the caller unwound.
            let _ = tx.send((index, path, result));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<ImageRecord>> = (0..total).map(|_| None).collect();
    let mut tracker = ProgressTracker::new(total, progress);
    let mut cancelled = false;
    for (index, path, result) in rx {
        match result {
            Some(Ok(record)) => {
                debug!(path = %path.display(), "metadata read");
                slots[index] = Some(record);
            }
            Some(Err(error)) => {
                warn!(path = %path.display(), %error, "excluding file");
                outcome.failures.push(FileFailure::new(path, error));
            }
            None => {
                cancelled = true;
                continue;
            }
        }
        tracker.advance();
    }

    if cancelled {
        info!("metadata read cancelled");
        return Err(SortError::Cancelled);
    }

    outcome.records = slots.into_iter().flatten().collect();
    outcome.camera_models = outcome
        .records
        .iter()
        .map(|record| record.camera_model.trim())
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect();
    outcome.failures.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        read = outcome.records.len(),
        failed = outcome.failures.len(),
        camera_models = outcome.camera_models.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "metadata read finished"
    );
    Ok(outcome)
}
