use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;

/// EXIF orientation code meaning "no transform".
pub const DEFAULT_ORIENTATION: u16 = 1;

/// Fields read from a file's EXIF block. Absent tags keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMetadata {
    pub orientation: u16,
    pub camera_model: String,
    pub capture_time: Option<NaiveDateTime>,
}

impl Default for CaptureMetadata {
    fn default() -> Self {
        Self {
            orientation: DEFAULT_ORIENTATION,
            camera_model: String::new(),
            capture_time: None,
        }
    }
}

/// One scanned image as it moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub file_path: PathBuf,
    /// File name without its extension.
    pub original_filename: String,
    /// Extension without the leading dot, case preserved.
    pub file_extension: String,
    calculated_filename: Option<String>,
    pub orientation: u16,
    pub original_capture_time: Option<NaiveDateTime>,
    pub corrected_capture_time: Option<NaiveDateTime>,
    pub camera_model: String,
}

impl ImageRecord {
    pub fn new(file_path: PathBuf, metadata: CaptureMetadata) -> Self {
        let original_filename = file_path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_extension = file_path
            .extension()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            file_path,
            original_filename,
            file_extension,
            calculated_filename: None,
            orientation: metadata.orientation,
            original_capture_time: metadata.capture_time,
            corrected_capture_time: None,
            camera_model: metadata.camera_model,
        }
    }

    /// The corrected capture time when one was computed, else the EXIF one.
    pub fn effective_capture_time(&self) -> Option<NaiveDateTime> {
        self.corrected_capture_time.or(self.original_capture_time)
    }

    /// The numbered name, or the original name until one is assigned.
    pub fn calculated_filename(&self) -> &str {
        match self.calculated_filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.original_filename,
        }
    }

    pub fn has_calculated_filename(&self) -> bool {
        self.calculated_filename.is_some()
    }

    pub(crate) fn assign_calculated_filename(&mut self, name: String) {
        debug_assert!(self.calculated_filename.is_none());
        self.calculated_filename = Some(name);
    }

    /// `calculated_filename` plus the original extension.
    pub fn target_file_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.calculated_filename().to_string()
        } else {
            format!("{}.{}", self.calculated_filename(), self.file_extension)
        }
    }
}
