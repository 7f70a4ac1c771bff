use crate::error::SortError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 92;

/// The eight EXIF orientation codes, named by the transform that makes the
/// stored pixels upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Unknown codes map to `Normal`.
    pub fn from_exif(code: u16) -> Self {
        match code {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn is_identity(self) -> bool {
        self == Orientation::Normal
    }

    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Normal => image,
            Orientation::FlipHorizontal => image.fliph(),
            Orientation::Rotate180 => image.rotate180(),
            Orientation::FlipVertical => image.flipv(),
            Orientation::Transpose => image.rotate90().fliph(),
            Orientation::Rotate90 => image.rotate90(),
            Orientation::Transverse => image.rotate270().fliph(),
            Orientation::Rotate270 => image.rotate270(),
        }
    }
}

/// Output format chosen from the file extension.
pub fn format_for(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

/// Decodes `source`, applies `orientation` and encodes the result into `out`
/// in the format implied by `source`'s extension.
pub fn write_upright<W: Write>(
    source: &Path,
    orientation: Orientation,
    out: W,
) -> Result<(), SortError> {
    let failed = |reason: String| SortError::RotationFailed {
        path: source.to_path_buf(),
        reason,
    };

    let format = format_for(source).ok_or_else(|| failed("unsupported file type".to_string()))?;
    let image = ImageReader::open(source)
        .map_err(|err| failed(err.to_string()))?
        .decode()
        .map_err(|err| failed(err.to_string()))?;
    let upright = orientation.apply(image);

    encode(upright, format, out).map_err(|err| failed(err.to_string()))
}

fn encode<W: Write>(image: DynamicImage, format: ImageFormat, out: W) -> image::ImageResult<()> {
    let mut out = BufWriter::new(out);
    match format {
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new(&mut out))?,
        _ => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?,
    }
    out.flush()?;
    Ok(())
}

/// Rewrites `path` upright through a sibling temporary file.
pub fn rotate_in_place(path: &Path, orientation: Orientation) -> Result<(), SortError> {
    if orientation.is_identity() {
        return Ok(());
    }

    let temp = temp_sibling(path);
    let result = File::create(&temp)
        .map_err(|err| SortError::RotationFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
        .and_then(|file| write_upright(path, orientation, file))
        .and_then(|()| {
            fs::rename(&temp, path).map_err(|err| SortError::RotationFailed {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        });

    if result.is_err() && temp.exists() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    parent.join(format!(".imgsort_rot_{}_{}", std::process::id(), file_name))
}

#[cfg(test)]
mod tests {
    use super::{format_for, rotate_in_place, Orientation};
    use crate::error::SortError;
    use crate::fixtures::{two_pixel_image, write_png};
    use image::{DynamicImage, Rgb};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn upright(code: u16) -> image::RgbImage {
        Orientation::from_exif(code)
            .apply(DynamicImage::ImageRgb8(two_pixel_image()))
            .to_rgb8()
    }

    #[test]
    fn horizontal_codes_keep_dimensions() {
        let normal = upright(1);
        assert_eq!(normal.dimensions(), (2, 1));
        assert_eq!(*normal.get_pixel(0, 0), RED);

        let flipped = upright(2);
        assert_eq!(*flipped.get_pixel(0, 0), BLUE);

        let turned = upright(3);
        assert_eq!(*turned.get_pixel(0, 0), BLUE);

        let vertical = upright(4);
        assert_eq!(vertical.dimensions(), (2, 1));
        assert_eq!(*vertical.get_pixel(0, 0), RED);
    }

    #[test]
    fn quarter_turn_codes_swap_dimensions() {
        for (code, top) in [(5, RED), (6, RED), (7, BLUE), (8, BLUE)] {
            let image = upright(code);
            assert_eq!(image.dimensions(), (1, 2), "code {code}");
            assert_eq!(*image.get_pixel(0, 0), top, "code {code}");
        }
    }

    #[test]
    fn unknown_codes_are_identity() {
        assert_eq!(Orientation::from_exif(0), Orientation::Normal);
        assert_eq!(Orientation::from_exif(9), Orientation::Normal);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_for(Path::new("a.JPG")), Some(image::ImageFormat::Jpeg));
        assert_eq!(format_for(Path::new("a.png")), Some(image::ImageFormat::Png));
        assert_eq!(format_for(Path::new("a.gif")), None);
    }

    #[test]
    fn rotate_in_place_rewrites_pixels() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wide.png");
        write_png(&path, &two_pixel_image());

        rotate_in_place(&path, Orientation::Rotate90).expect("rotate");
        let image = image::open(&path).expect("reopen").to_rgb8();
        assert_eq!(image.dimensions(), (1, 2));
        assert_eq!(*image.get_pixel(0, 1), BLUE);

        let leftovers = fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn rotate_in_place_reports_undecodable_files() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.jpg");
        fs::write(&path, b"not pixels").expect("write");

        let err = rotate_in_place(&path, Orientation::Rotate180).expect_err("must fail");
        assert!(matches!(err, SortError::RotationFailed { .. }));
        assert_eq!(fs::read(&path).expect("read"), b"not pixels");
        assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 1);
    }
}
