use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a sorting run can fail.
///
/// `PathNotFound`, `InvalidOffset`, `FilenamesAlreadyAssigned`, `WorkerPool` and
/// `Cancelled` abort the run. The remaining variants describe a single file and
/// are collected into [`FileFailure`]s while the batch continues.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SortError {
    #[error("directory does not exist: {}", path.display())]
    PathNotFound { path: PathBuf },
    #[error("could not read image metadata from {}: {reason}", path.display())]
    MetadataUnreadable { path: PathBuf, reason: String },
    #[error("no capture time to correct in {}", path.display())]
    MissingCaptureTime { path: PathBuf },
    #[error("time offset for camera '{camera_model}' leaves the supported range: {}", path.display())]
    TimeOffsetOutOfRange { path: PathBuf, camera_model: String },
    #[error("numbering offset {offset} produces a negative file number")]
    InvalidOffset { offset: i64 },
    #[error("file names were already calculated for this run")]
    FilenamesAlreadyAssigned,
    #[error("rename failed: {} -> {}: {reason}", from.display(), to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    #[error("destination already exists: {}", path.display())]
    CopyCollision { path: PathBuf },
    #[error("copy failed: {} -> {}: {reason}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    #[error("could not rotate {}: {reason}", path.display())]
    RotationFailed { path: PathBuf, reason: String },
    #[error("could not start worker pool: {reason}")]
    WorkerPool { reason: String },
    #[error("run cancelled")]
    Cancelled,
}

impl SortError {
    /// Whether the error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SortError::PathNotFound { .. }
                | SortError::InvalidOffset { .. }
                | SortError::FilenamesAlreadyAssigned
                | SortError::WorkerPool { .. }
                | SortError::Cancelled
        )
    }
}

/// A per-file error kept for the end-of-stage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: SortError,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, error: SortError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
