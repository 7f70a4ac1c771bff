use crate::error::{FileFailure, SortError};
use crate::metadata::ImageRecord;
use crate::progress::{CancellationToken, ProgressFn, ProgressTracker};
use crate::rotate::{rotate_in_place, write_upright, Orientation};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the sorted collection is committed to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    /// Copy into this directory; `None` renames every file in place.
    pub copy_to: Option<PathBuf>,
    pub rotate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub rotated: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteOutcome {
    pub written: Vec<WrittenFile>,
    pub failures: Vec<FileFailure>,
    /// Files not attempted because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

/// Commits every record in the given order.
///
/// A failing file is recorded and the batch continues. Files already committed
/// stay committed when a later one fails or the run is cancelled.
pub fn write_images(
    records: &[ImageRecord],
    plan: &WritePlan,
    progress: &ProgressFn<'_>,
    cancel: &CancellationToken,
) -> WriteOutcome {
    let mut tracker = ProgressTracker::new(records.len(), progress);
    let outcome = match plan.copy_to.as_deref() {
        Some(dir) => copy_all(records, dir, plan.rotate, &mut tracker, cancel),
        None => rename_all(records, plan.rotate, &mut tracker, cancel),
    };

    info!(
        written = outcome.written.len(),
        failed = outcome.failures.len(),
        skipped = outcome.skipped,
        cancelled = outcome.cancelled,
        "write finished"
    );
    outcome
}

#[derive(Debug)]
struct StagedRename {
    original_path: PathBuf,
    target_path: PathBuf,
    temp_path: PathBuf,
}

enum Stage {
    Staged(StagedRename),
    Unchanged(PathBuf),
    Failed,
}

/// Moves every source to a temporary name first so that files swapping names
/// within the batch never see each other as collisions.
fn rename_all(
    records: &[ImageRecord],
    rotate: bool,
    tracker: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    if cancel.is_cancelled() {
        outcome.cancelled = true;
        outcome.skipped = records.len();
        return outcome;
    }

    let mut stages = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let original_path = record.file_path.clone();
        let target_path = sibling(&original_path, &record.target_file_name());
        if target_path == original_path {
            stages.push(Stage::Unchanged(original_path));
            continue;
        }

        let temp_path = temp_path_for(&original_path, index);
        match fs::rename(&original_path, &temp_path) {
            Ok(()) => stages.push(Stage::Staged(StagedRename {
                original_path,
                target_path,
                temp_path,
            })),
            Err(err) => {
                warn!(path = %original_path.display(), error = %err, "could not stage rename");
                outcome.failures.push(FileFailure::new(
                    original_path.clone(),
                    SortError::RenameFailed {
                        from: original_path,
                        to: target_path,
                        reason: err.to_string(),
                    },
                ));
                stages.push(Stage::Failed);
            }
        }
    }

    let mut stages = stages.into_iter().zip(records);
    while let Some((stage, record)) = stages.next() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            outcome.skipped += 1;
            unstage(stage);
            for (stage, _) in stages.by_ref() {
                outcome.skipped += 1;
                unstage(stage);
            }
            break;
        }

        match stage {
            Stage::Unchanged(path) => {
                debug!(path = %path.display(), "name unchanged");
                let rotated = rotate && rotate_committed(&path, record, &mut outcome);
                outcome.written.push(WrittenFile {
                    from: path.clone(),
                    to: path,
                    rotated,
                });
            }
            Stage::Staged(entry) => match finalize_rename(&entry) {
                Ok(()) => {
                    debug!(
                        from = %entry.original_path.display(),
                        to = %entry.target_path.display(),
                        "renamed"
                    );
                    let rotated =
                        rotate && rotate_committed(&entry.target_path, record, &mut outcome);
                    outcome.written.push(WrittenFile {
                        from: entry.original_path,
                        to: entry.target_path,
                        rotated,
                    });
                }
                Err(error) => {
                    warn!(%error, "rename failed");
                    restore_original(&entry);
                    outcome
                        .failures
                        .push(FileFailure::new(entry.original_path.clone(), error));
                }
            },
            Stage::Failed => {}
        }
        tracker.advance();
    }

    outcome
}

fn finalize_rename(entry: &StagedRename) -> Result<(), SortError> {
    let failed = |reason: String| SortError::RenameFailed {
        from: entry.original_path.clone(),
        to: entry.target_path.clone(),
        reason,
    };

    if fs::symlink_metadata(&entry.target_path).is_ok() {
        return Err(failed("destination already exists".to_string()));
    }
    fs::rename(&entry.temp_path, &entry.target_path).map_err(|err| failed(err.to_string()))
}

fn unstage(stage: Stage) {
    if let Stage::Staged(entry) = stage {
        restore_original(&entry);
    }
}

fn restore_original(entry: &StagedRename) {
    if let Err(err) = fs::rename(&entry.temp_path, &entry.original_path) {
        warn!(
            temp = %entry.temp_path.display(),
            original = %entry.original_path.display(),
            error = %err,
            "could not restore original name"
        );
    }
}

/// Rotates a file that already has its final name; a failure leaves it unrotated.
fn rotate_committed(path: &Path, record: &ImageRecord, outcome: &mut WriteOutcome) -> bool {
    let orientation = Orientation::from_exif(record.orientation);
    if orientation.is_identity() {
        return false;
    }
    match rotate_in_place(path, orientation) {
        Ok(()) => true,
        Err(error) => {
            warn!(%error, "rotation failed");
            outcome
                .failures
                .push(FileFailure::new(record.file_path.clone(), error));
            false
        }
    }
}

fn copy_all(
    records: &[ImageRecord],
    dir: &Path,
    rotate: bool,
    tracker: &mut ProgressTracker<'_>,
    cancel: &CancellationToken,
) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();
    if records.is_empty() {
        return outcome;
    }

    if let Err(err) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %err, "could not create output directory");
        for record in records {
            outcome.failures.push(FileFailure::new(
                record.file_path.clone(),
                SortError::CopyFailed {
                    from: record.file_path.clone(),
                    to: dir.join(record.target_file_name()),
                    reason: err.to_string(),
                },
            ));
            tracker.advance();
        }
        return outcome;
    }

    for (index, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            outcome.skipped = records.len() - index;
            break;
        }

        let target = dir.join(record.target_file_name());
        match copy_one(record, &target, rotate) {
            Ok(rotation) => {
                debug!(from = %record.file_path.display(), to = %target.display(), "copied");
                let rotated = match rotation {
                    Ok(rotated) => rotated,
                    Err(error) => {
                        warn!(%error, "rotation failed, copied unrotated");
                        outcome
                            .failures
                            .push(FileFailure::new(record.file_path.clone(), error));
                        false
                    }
                };
                outcome.written.push(WrittenFile {
                    from: record.file_path.clone(),
                    to: target,
                    rotated,
                });
            }
            Err(error) => {
                warn!(%error, "copy failed");
                outcome
                    .failures
                    .push(FileFailure::new(record.file_path.clone(), error));
            }
        }
        tracker.advance();
    }

    outcome
}

/// Copies one file. The outer error means nothing was written; the inner one
/// reports a rotation that fell back to a byte-for-byte copy.
fn copy_one(
    record: &ImageRecord,
    target: &Path,
    rotate: bool,
) -> Result<Result<bool, SortError>, SortError> {
    let copy_failed = |reason: String| SortError::CopyFailed {
        from: record.file_path.clone(),
        to: target.to_path_buf(),
        reason,
    };

    let orientation = Orientation::from_exif(record.orientation);
    let mut rotation = Ok(false);
    if rotate && !orientation.is_identity() {
        let file = create_new(target).map_err(|err| collision_or(err, target, &copy_failed))?;
        match write_upright(&record.file_path, orientation, file) {
            Ok(()) => return Ok(Ok(true)),
            Err(error) => {
                let _ = fs::remove_file(target);
                rotation = Err(error);
            }
        }
    }

    let mut dest = create_new(target).map_err(|err| collision_or(err, target, &copy_failed))?;
    let copied = File::open(&record.file_path).and_then(|mut src| io::copy(&mut src, &mut dest));
    if let Err(err) = copied {
        drop(dest);
        let _ = fs::remove_file(target);
        return Err(copy_failed(err.to_string()));
    }
    Ok(rotation)
}

/// Opening with `create_new` makes the existence check and the creation one
/// atomic step per destination path.
fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn collision_or(
    err: io::Error,
    target: &Path,
    otherwise: &dyn Fn(String) -> SortError,
) -> SortError {
    if err.kind() == ErrorKind::AlreadyExists {
        SortError::CopyCollision {
            path: target.to_path_buf(),
        }
    } else {
        otherwise(err.to_string())
    }
}

fn sibling(path: &Path, file_name: &str) -> PathBuf {
    path.parent()
        .unwrap_or_else(|| Path::new("."))
        .join(file_name)
}

fn temp_path_for(original_path: &Path, index: usize) -> PathBuf {
    let file_name = original_path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    sibling(
        original_path,
        &format!(".imgsort_tmp_{}_{}_{}", std::process::id(), index, file_name),
    )
}
