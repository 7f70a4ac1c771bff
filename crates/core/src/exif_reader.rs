use crate::error::SortError;
use crate::metadata::{CaptureMetadata, ImageRecord, DEFAULT_ORIENTATION};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use image::ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, trace};

/// Reads one image file into an [`ImageRecord`].
///
/// The file must be a decodable JPEG or PNG. A missing or partial EXIF block is not
/// an error: absent tags keep the defaults of [`CaptureMetadata`].
pub fn read_image_metadata(path: &Path) -> Result<ImageRecord, SortError> {
    ensure_decodable(path)?;

    let metadata = match read_exif(path) {
        Ok(exif) => capture_metadata(&exif),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no usable EXIF block");
            CaptureMetadata::default()
        }
    };
    trace!(
        path = %path.display(),
        orientation = metadata.orientation,
        camera_model = %metadata.camera_model,
        capture_time = ?metadata.capture_time,
        "read metadata"
    );

    Ok(ImageRecord::new(path.to_path_buf(), metadata))
}

fn ensure_decodable(path: &Path) -> Result<(), SortError> {
    let unreadable = |reason: String| SortError::MetadataUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| unreadable(err.to_string()))?
        .into_dimensions()
        .map_err(|err| unreadable(err.to_string()))?;
    Ok(())
}

fn read_exif(path: &Path) -> Result<exif::Exif, exif::Error> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    Reader::new().read_from_container(&mut buf)
}

fn capture_metadata(exif: &exif::Exif) -> CaptureMetadata {
    let orientation = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|code| (1..=8).contains(code))
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(DEFAULT_ORIENTATION);

    let camera_model = ascii_field(exif, Tag::Model).unwrap_or_default();

    let capture_time = [Tag::DateTimeOriginal, Tag::DateTimeDigitized]
        .into_iter()
        .find_map(|tag| ascii_field(exif, tag).and_then(|raw| parse_date(&raw)));

    CaptureMetadata {
        orientation,
        camera_model,
        capture_time,
    }
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string()
            })
            .filter(|v| !v.is_empty()),
        _ => None,
    }
}

fn parse_date(input: &str) -> Option<NaiveDateTime> {
    let normalized = input.trim();

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    candidates
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(normalized, fmt).ok())
}
