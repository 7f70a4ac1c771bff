use crate::metadata::ImageRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Corrected capture time, falling back to the original one.
    CaptureTime,
    OriginalFilename,
    CameraModel,
    FilePath,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub key: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortCriterion {
    pub const fn ascending(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Ascending,
        }
    }

    pub const fn descending(key: SortKey) -> Self {
        Self {
            key,
            direction: SortDirection::Descending,
        }
    }

    pub fn compare(&self, a: &ImageRecord, b: &ImageRecord) -> Ordering {
        match self.key {
            SortKey::CaptureTime => compare_capture_time(a, b, self.direction),
            SortKey::OriginalFilename => self
                .direction
                .apply(a.original_filename.cmp(&b.original_filename)),
            SortKey::CameraModel => self.direction.apply(a.camera_model.cmp(&b.camera_model)),
            SortKey::FilePath => self.direction.apply(a.file_path.cmp(&b.file_path)),
        }
    }
}

pub fn default_sort_criteria() -> Vec<SortCriterion> {
    vec![SortCriterion::ascending(SortKey::CaptureTime)]
}

/// Records without a time always go last, whatever the direction, and are
/// ordered among themselves by original file name (the stem, so `IMG_1.jpg`
/// sorts before `IMG_1-2.jpg`).
fn compare_capture_time(a: &ImageRecord, b: &ImageRecord, direction: SortDirection) -> Ordering {
    match (a.effective_capture_time(), b.effective_capture_time()) {
        (Some(x), Some(y)) => direction.apply(x.cmp(&y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.original_filename.cmp(&b.original_filename),
    }
}

/// Evaluates `comparators` in order; the first non-equal result decides.
///
/// Each comparator must be a total order on its own (antisymmetric and
/// transitive), otherwise the combined order is not one either and the result
/// of sorting with it is unspecified.
pub fn compare_chain<T>(a: &T, b: &T, comparators: &[&dyn Fn(&T, &T) -> Ordering]) -> Ordering {
    comparators
        .iter()
        .map(|compare| compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable sort by a comparator chain; ties keep their current relative order.
pub fn sort_by_chain<T>(items: &mut [T], comparators: &[&dyn Fn(&T, &T) -> Ordering]) {
    if comparators.is_empty() {
        return;
    }
    items.sort_by(|a, b| compare_chain(a, b, comparators));
}

/// Stable sort of the records by `criteria`; an empty list means capture time.
pub fn sort_records(records: &mut [ImageRecord], criteria: &[SortCriterion]) {
    let defaults;
    let criteria = if criteria.is_empty() {
        defaults = default_sort_criteria();
        &defaults[..]
    } else {
        criteria
    };

    let comparators: Vec<_> = criteria
        .iter()
        .map(|criterion| move |a: &ImageRecord, b: &ImageRecord| criterion.compare(a, b))
        .collect();
    let chain: Vec<&dyn Fn(&ImageRecord, &ImageRecord) -> Ordering> = comparators
        .iter()
        .map(|compare| compare as &dyn Fn(&ImageRecord, &ImageRecord) -> Ordering)
        .collect();

    sort_by_chain(records, &chain);
    info!(records = records.len(), keys = criteria.len(), "records sorted");
}
