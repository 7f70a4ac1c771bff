use crate::error::{FileFailure, SortError};
use crate::metadata::ImageRecord;
use crate::modifier::apply_camera_offsets;
use crate::naming::assign_filenames;
use crate::progress::{CancellationToken, ProgressFn};
use crate::reader::read_images;
use crate::scanner::scan_image_files;
use crate::settings::PipelineSettings;
use crate::sorter::sort_records;
use crate::writer::{write_images, WritePlan, WrittenFile};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Callbacks and switches owned by the caller of [`run_pipeline`].
pub struct RunHooks<'a> {
    pub read_progress: Box<ProgressFn<'a>>,
    pub write_progress: Box<ProgressFn<'a>>,
    pub cancel: CancellationToken,
    /// Plan only; nothing on disk is touched.
    pub dry_run: bool,
}

impl Default for RunHooks<'_> {
    fn default() -> Self {
        Self {
            read_progress: Box::new(|_: f64| {}),
            write_progress: Box::new(|_: f64| {}),
            cancel: CancellationToken::new(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub source: PathBuf,
    pub target_name: String,
    pub capture_time: Option<NaiveDateTime>,
    pub camera_model: String,
}

impl PlannedFile {
    fn from_record(record: &ImageRecord) -> Self {
        Self {
            source: record.file_path.clone(),
            target_name: record.target_file_name(),
            capture_time: record.effective_capture_time(),
            camera_model: record.camera_model.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub scanned: usize,
    /// Files in their final sorted order with the names they get.
    pub planned: Vec<PlannedFile>,
    pub camera_models: BTreeSet<String>,
    pub read_failures: Vec<FileFailure>,
    pub correction_failures: Vec<FileFailure>,
    pub write_failures: Vec<FileFailure>,
    pub written: Vec<WrittenFile>,
    pub skipped: usize,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.read_failures
            .iter()
            .chain(&self.correction_failures)
            .chain(&self.write_failures)
    }

    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.failures().next().is_none()
    }
}

/// Scan, read, correct, sort, name and write one directory.
///
/// Per-file problems end up in the report. Fatal errors (a missing root, a
/// negative file number, a worker pool that cannot start, cancellation while
/// reading) abort before anything is written.
pub fn run_pipeline(
    root: &Path,
    settings: &PipelineSettings,
    hooks: &RunHooks<'_>,
) -> Result<RunReport, SortError> {
    if !root.is_dir() {
        return Err(SortError::PathNotFound {
            path: root.to_path_buf(),
        });
    }

    let paths = scan_image_files(root, settings.recursive, &settings.extensions)?;
    let scanned = paths.len();
    let read = read_images(
        paths,
        settings.workers,
        hooks.read_progress.as_ref(),
        &hooks.cancel,
    )?;

    let mut records = read.records;
    let correction_failures = apply_camera_offsets(
        &mut records,
        &settings.camera_offsets,
        settings.require_time_correction,
    );
    sort_records(&mut records, &settings.sort_keys);
    assign_filenames(&mut records, settings)?;

    let mut report = RunReport {
        root: root.to_path_buf(),
        scanned,
        planned: records.iter().map(PlannedFile::from_record).collect(),
        camera_models: read.camera_models,
        read_failures: read.failures,
        correction_failures,
        dry_run: hooks.dry_run,
        ..RunReport::default()
    };
    if hooks.dry_run {
        info!(files = records.len(), "dry run, nothing written");
        return Ok(report);
    }

    let plan = WritePlan {
        copy_to: settings
            .write
            .copy
            .then(|| settings.copy_destination(root)),
        rotate: settings.write.rotate,
    };
    let outcome = write_images(
        &records,
        &plan,
        hooks.write_progress.as_ref(),
        &hooks.cancel,
    );
    report.written = outcome.written;
    report.write_failures = outcome.failures;
    report.skipped = outcome.skipped;
    report.cancelled = outcome.cancelled;
    Ok(report)
}

/// Distinct camera models found under `root`, for building offset rules.
pub fn list_camera_models(
    root: &Path,
    settings: &PipelineSettings,
) -> Result<BTreeSet<String>, SortError> {
    let paths = scan_image_files(root, settings.recursive, &settings.extensions)?;
    let read = read_images(paths, settings.workers, &|_| {}, &CancellationToken::new())?;
    Ok(read.camera_models)
}

#[cfg(test)]
mod tests {
    use super::{list_camera_models, run_pipeline, RunHooks};
    use crate::error::SortError;
    use crate::fixtures::{write_jpeg, ExifFixture};
    use crate::settings::{CameraOffsetRule, PipelineSettings, WriteSettings};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn shoot(dir: &Path, name: &str, time: &'static str, model: &'static str) {
        write_jpeg(
            &dir.join(name),
            &ExifFixture {
                capture_time: Some(time),
                camera_model: Some(model),
                orientation: None,
            },
        );
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .flatten()
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn corrects_sorts_and_renames_in_place() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "IMG_1.jpg", "2022:08:14 10:00:00", "Canon");
        shoot(temp.path(), "DSC_1.jpg", "2022:08:14 09:30:00", "Nikon");
        shoot(temp.path(), "DSC_2.jpg", "2022:08:14 11:00:00", "Nikon");
        fs::write(temp.path().join("notes.txt"), b"skip me").expect("write");

        let settings = PipelineSettings {
            prefix: "trip_".to_string(),
            offset: 1,
            camera_offsets: vec!["Nikon=0,0,0,1,0,0".parse::<CameraOffsetRule>().expect("rule")],
            ..PipelineSettings::default()
        };
        let report = run_pipeline(temp.path(), &settings, &RunHooks::default()).expect("run");

        assert!(report.succeeded(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.scanned, 3);
        let order: Vec<_> = report
            .planned
            .iter()
            .map(|p| p.source.file_name().expect("name").to_string_lossy().to_string())
            .collect();
        assert_eq!(order, vec!["IMG_1.jpg", "DSC_1.jpg", "DSC_2.jpg"]);
        assert_eq!(
            file_names(temp.path()),
            vec!["notes.txt", "trip_1.jpg", "trip_2.jpg", "trip_3.jpg"]
        );
        assert_eq!(
            report.camera_models.iter().cloned().collect::<Vec<_>>(),
            vec!["Canon", "Nikon"]
        );
    }

    #[test]
    fn dry_run_plans_without_touching_files() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "b.jpg", "2021:01:01 08:00:00", "X");
        shoot(temp.path(), "a.jpg", "2021:01:01 09:00:00", "X");

        let read_seen = RefCell::new(Vec::new());
        let hooks = RunHooks {
            read_progress: Box::new(|f: f64| read_seen.borrow_mut().push(f)),
            dry_run: true,
            ..RunHooks::default()
        };
        let report = run_pipeline(temp.path(), &PipelineSettings::default(), &hooks).expect("run");

        assert!(report.dry_run);
        assert!(report.written.is_empty());
        assert_eq!(report.planned[0].target_name, "0.jpg");
        assert!(report.planned[0].source.ends_with("b.jpg"));
        assert_eq!(file_names(temp.path()), vec!["a.jpg", "b.jpg"]);
        assert_eq!(read_seen.borrow().last().copied(), Some(1.0));
    }

    #[test]
    fn copy_mode_leaves_sources_and_fills_output_dir() {
        let temp = tempdir().expect("tempdir");
        let photos = temp.path().join("photos");
        shoot(&photos, "a.jpg", "2021:01:01 08:00:00", "X");
        write_jpeg(
            &photos.join("rotated.jpg"),
            &ExifFixture {
                capture_time: Some("2021:01:01 07:00:00"),
                camera_model: Some("X"),
                orientation: Some(6),
            },
        );

        let settings = PipelineSettings {
            output_dir: Some(temp.path().join("out")),
            output_subdir: Some("day1".to_string()),
            suffix: "_d1".to_string(),
            write: WriteSettings {
                copy: true,
                rotate: true,
            },
            ..PipelineSettings::default()
        };
        let report = run_pipeline(&photos, &settings, &RunHooks::default()).expect("run");

        assert!(report.succeeded(), "{:?}", report.failures().collect::<Vec<_>>());
        let out = temp.path().join("out").join("day1");
        assert_eq!(file_names(&out), vec!["0_d1.jpg", "1_d1.jpg"]);
        assert!(report.written[0].rotated);
        assert!(!report.written[1].rotated);
        assert_eq!(file_names(&photos), vec!["a.jpg", "rotated.jpg"]);
    }

    #[test]
    fn unreadable_files_are_reported_and_left_alone() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "good.jpg", "2021:01:01 08:00:00", "X");
        fs::write(temp.path().join("bad.jpg"), b"not an image").expect("write");

        let report =
            run_pipeline(temp.path(), &PipelineSettings::default(), &RunHooks::default())
                .expect("run");

        assert_eq!(report.read_failures.len(), 1);
        assert!(matches!(
            report.read_failures[0].error,
            SortError::MetadataUnreadable { .. }
        ));
        assert_eq!(file_names(temp.path()), vec!["0.jpg", "bad.jpg"]);
        assert!(!report.succeeded());
    }

    #[test]
    fn negative_offset_aborts_before_writing() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "a.jpg", "2021:01:01 08:00:00", "X");

        let settings = PipelineSettings {
            offset: -1,
            ..PipelineSettings::default()
        };
        let err = run_pipeline(temp.path(), &settings, &RunHooks::default()).expect_err("fatal");
        assert_eq!(err, SortError::InvalidOffset { offset: -1 });
        assert_eq!(file_names(temp.path()), vec!["a.jpg"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("nope");
        let err = run_pipeline(&missing, &PipelineSettings::default(), &RunHooks::default())
            .expect_err("fatal");
        assert_eq!(err, SortError::PathNotFound { path: missing });
    }

    #[test]
    fn cancelled_before_start_reads_nothing() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "a.jpg", "2021:01:01 08:00:00", "X");

        let hooks = RunHooks::default();
        hooks.cancel.cancel();
        let err = run_pipeline(temp.path(), &PipelineSettings::default(), &hooks)
            .expect_err("cancelled");
        assert_eq!(err, SortError::Cancelled);
        assert_eq!(file_names(temp.path()), vec!["a.jpg"]);
    }

    #[test]
    fn lists_camera_models_recursively() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "a.jpg", "2021:01:01 08:00:00", "Canon");
        shoot(&temp.path().join("sub"), "b.jpg", "2021:01:01 08:00:00", "Fuji");

        let models = list_camera_models(temp.path(), &PipelineSettings::default()).expect("models");
        assert_eq!(models.into_iter().collect::<Vec<_>>(), vec!["Canon", "Fuji"]);
    }

    #[cfg(unix)]
    #[test]
    fn linked_directory_does_not_duplicate_records() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "a.jpg", "2021:01:01 08:00:00", "X");
        shoot(&temp.path().join("sub"), "b.jpg", "2021:01:01 09:00:00", "X");
        std::os::unix::fs::symlink(temp.path().join("sub"), temp.path().join("link"))
            .expect("symlink");

        let report = run_pipeline(temp.path(), &PipelineSettings::default(), &RunHooks::default())
            .expect("run");

        assert!(report.succeeded(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.scanned, 2);
        assert_eq!(report.written.len(), 2);
        assert_eq!(file_names(temp.path()), vec!["0.jpg"]);
        assert_eq!(file_names(&temp.path().join("sub")), vec!["1.jpg"]);
    }

    #[test]
    fn interrupt_while_writing_restores_pending_files() {
        let temp = tempdir().expect("tempdir");
        shoot(temp.path(), "a.jpg", "2021:01:01 08:00:00", "X");
        shoot(temp.path(), "b.jpg", "2021:01:01 09:00:00", "X");
        shoot(temp.path(), "c.jpg", "2021:01:01 10:00:00", "X");

        let hooks = RunHooks::default();
        let interrupt = hooks.cancel.clone();
        let hooks = RunHooks {
            write_progress: Box::new(move |_: f64| interrupt.cancel()),
            ..hooks
        };
        let report = run_pipeline(temp.path(), &PipelineSettings::default(), &hooks).expect("run");

        assert!(report.cancelled);
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(file_names(temp.path()), vec!["0.jpg", "b.jpg", "c.jpg"]);
    }
}
