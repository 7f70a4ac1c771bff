use crate::scanner::DEFAULT_EXTENSIONS;
use crate::sorter::{default_sort_criteria, SortCriterion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Everything a run needs from the configuration and command-line layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Destination for copy mode. Relative paths are taken from the scanned root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Named subdirectory under `output_dir` for copy mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_subdir: Option<String>,
    pub prefix: String,
    pub suffix: String,
    pub offset: i64,
    /// Lower bound for the zero-padded width; computed from the batch size when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_digits: Option<usize>,
    pub recursive: bool,
    pub extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    pub require_time_correction: bool,
    pub write: WriteSettings,
    pub sort_keys: Vec<SortCriterion>,
    pub camera_offsets: Vec<CameraOffsetRule>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            output_subdir: None,
            prefix: String::new(),
            suffix: String::new(),
            offset: 0,
            min_digits: None,
            recursive: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|v| v.to_string()).collect(),
            workers: None,
            require_time_correction: false,
            write: WriteSettings::default(),
            sort_keys: default_sort_criteria(),
            camera_offsets: Vec::new(),
        }
    }
}

impl PipelineSettings {
    /// Directory that copy mode writes into, resolved against `root`.
    pub fn copy_destination(&self, root: &Path) -> PathBuf {
        let base = match self.output_dir.as_deref() {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        };
        match self.output_subdir.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => base.join(sub),
            _ => base,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSettings {
    /// Copy into the output directory instead of renaming in place.
    pub copy: bool,
    /// Rewrite pixel data upright according to the EXIF orientation.
    pub rotate: bool,
}

/// Clock correction for every image taken with one camera model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOffsetRule {
    pub camera_model: String,
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraRuleError {
    #[error("expected MODEL=years,months,days,hours,minutes,seconds")]
    MissingSeparator,
    #[error("camera model must not be empty")]
    EmptyModel,
    #[error("expected 6 offsets, got {0}")]
    FieldCount(usize),
    #[error("not an integer offset: {0}")]
    InvalidNumber(String),
}

impl FromStr for CameraOffsetRule {
    type Err = CameraRuleError;

    /// Parses `MODEL=years,months,days,hours,minutes,seconds`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (model, offsets) = input
            .rsplit_once('=')
            .ok_or(CameraRuleError::MissingSeparator)?;
        let model = model.trim();
        if model.is_empty() {
            return Err(CameraRuleError::EmptyModel);
        }

        let values = offsets
            .split(',')
            .map(|raw| {
                let raw = raw.trim();
                raw.parse::<i32>()
                    .map_err(|_| CameraRuleError::InvalidNumber(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let &[years, months, days, hours, minutes, seconds] = values.as_slice() else {
            return Err(CameraRuleError::FieldCount(values.len()));
        };

        Ok(Self {
            camera_model: model.to_string(),
            years,
            months,
            days,
            hours,
            minutes,
            seconds,
        })
    }
}
