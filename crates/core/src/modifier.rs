use crate::error::{FileFailure, SortError};
use crate::metadata::ImageRecord;
use crate::settings::CameraOffsetRule;
use chrono::{Months, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

/// Sets `corrected_capture_time` on every record whose camera model has a rule.
///
/// When several rules name the same model the last one wins. Records without an
/// original capture time are skipped; with `require_correction` they are also
/// reported as [`SortError::MissingCaptureTime`]. Records stay in the collection
/// either way.
pub fn apply_camera_offsets(
    records: &mut [ImageRecord],
    rules: &[CameraOffsetRule],
    require_correction: bool,
) -> Vec<FileFailure> {
    let mut failures = Vec::new();
    if rules.is_empty() {
        return failures;
    }

    let mut corrected = 0usize;
    for record in records.iter_mut() {
        let Some(rule) = rules
            .iter()
            .rev()
            .find(|rule| rule.camera_model == record.camera_model)
        else {
            continue;
        };

        let Some(original) = record.original_capture_time else {
            if require_correction {
                warn!(path = %record.file_path.display(), "no capture time to correct");
                failures.push(FileFailure::new(
                    record.file_path.clone(),
                    SortError::MissingCaptureTime {
                        path: record.file_path.clone(),
                    },
                ));
            } else {
                debug!(path = %record.file_path.display(), "no capture time, correction skipped");
            }
            continue;
        };

        match shift_by_rule(original, rule) {
            Some(time) => {
                record.corrected_capture_time = Some(time);
                corrected += 1;
            }
            None => {
                warn!(path = %record.file_path.display(), "corrected time out of range");
                failures.push(FileFailure::new(
                    record.file_path.clone(),
                    SortError::TimeOffsetOutOfRange {
                        path: record.file_path.clone(),
                        camera_model: rule.camera_model.clone(),
                    },
                ));
            }
        }
    }

    info!(corrected, failed = failures.len(), "capture times corrected");
    failures
}

/// Calendar-aware addition: years, then months (clamping the day to the end of
/// the month), then the fixed-length units.
pub fn shift_by_rule(time: NaiveDateTime, rule: &CameraOffsetRule) -> Option<NaiveDateTime> {
    let time = shift_months(time, i64::from(rule.years) * 12)?;
    let time = shift_months(time, i64::from(rule.months))?;

    let delta = TimeDelta::try_days(i64::from(rule.days))?
        .checked_add(&TimeDelta::try_hours(i64::from(rule.hours))?)?
        .checked_add(&TimeDelta::try_minutes(i64::from(rule.minutes))?)?
        .checked_add(&TimeDelta::try_seconds(i64::from(rule.seconds))?)?;
    time.checked_add_signed(delta)
}

fn shift_months(time: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let amount = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        time.checked_add_months(amount)
    } else {
        time.checked_sub_months(amount)
    }
}
