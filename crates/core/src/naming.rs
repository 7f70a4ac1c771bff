use crate::error::SortError;
use crate::metadata::ImageRecord;
use crate::settings::PipelineSettings;
use tracing::info;

/// Prefix, suffix, first number and zero-padded width for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameScheme {
    pub prefix: String,
    pub suffix: String,
    pub offset: i64,
    pub digits: usize,
}

impl FilenameScheme {
    /// Fixes the width for a batch of `count` files.
    pub fn for_batch(settings: &PipelineSettings, count: usize) -> Self {
        Self {
            prefix: sanitize_affix(&settings.prefix),
            suffix: sanitize_affix(&settings.suffix),
            offset: settings.offset,
            digits: digit_count(count, settings.offset, settings.min_digits),
        }
    }

    pub fn filename(&self, index: usize) -> Result<String, SortError> {
        calculate_filename(index, &self.prefix, &self.suffix, self.offset, self.digits)
    }
}

/// Smallest `d` with `count + offset < 10^d`, raised to `min_digits`.
pub fn digit_count(count: usize, offset: i64, min_digits: Option<usize>) -> usize {
    let highest = count as i128 + i128::from(offset);
    let mut digits = 1usize;
    let mut bound = 10i128;
    while highest >= bound {
        bound *= 10;
        digits += 1;
    }
    digits.max(min_digits.unwrap_or(1))
}

/// `prefix + zero_pad(index + offset, digits) + suffix`.
pub fn calculate_filename(
    index: usize,
    prefix: &str,
    suffix: &str,
    offset: i64,
    digits: usize,
) -> Result<String, SortError> {
    let number = i64::try_from(index)
        .ok()
        .and_then(|i| i.checked_add(offset))
        .filter(|n| *n >= 0)
        .ok_or(SortError::InvalidOffset { offset })?;
    Ok(format!("{prefix}{number:0digits$}{suffix}"))
}

/// Names for positions `0..count`. Pure: identical inputs give identical names.
pub fn calculate_filenames(
    count: usize,
    settings: &PipelineSettings,
) -> Result<Vec<String>, SortError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let scheme = FilenameScheme::for_batch(settings, count);
    (0..count).map(|index| scheme.filename(index)).collect()
}

/// Stores each record's name by its position in the sorted collection.
///
/// Either every record gets a name or none does. A collection that was already
/// numbered is rejected rather than renumbered.
pub fn assign_filenames(
    records: &mut [ImageRecord],
    settings: &PipelineSettings,
) -> Result<(), SortError> {
    if records.is_empty() {
        return Ok(());
    }
    if records.iter().any(ImageRecord::has_calculated_filename) {
        return Err(SortError::FilenamesAlreadyAssigned);
    }

    let names = calculate_filenames(records.len(), settings)?;
    for (record, name) in records.iter_mut().zip(names) {
        record.assign_calculated_filename(name);
    }
    info!(files = records.len(), "file names calculated");
    Ok(())
}

/// Replaces characters that cannot appear in a file name.
fn sanitize_affix(value: &str) -> String {
    value
        .chars()
        .map(|ch| if is_disallowed_char(ch) { '_' } else { ch })
        .collect()
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || ch.is_control()
}
