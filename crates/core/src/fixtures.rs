//! Image files for unit tests, generated on the fly.

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ExifFixture {
    pub capture_time: Option<&'static str>,
    pub camera_model: Option<&'static str>,
    pub orientation: Option<u16>,
}

/// Two pixels side by side: red left, blue right.
pub fn two_pixel_image() -> RgbImage {
    RgbImage::from_fn(2, 1, |x, _| {
        if x == 0 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("encode fixture image");
    bytes
}

pub fn write_png(path: &Path, image: &RgbImage) {
    create_parent(path);
    fs::write(path, encode(image, ImageFormat::Png)).expect("write png fixture");
}

pub fn write_jpeg(path: &Path, exif: &ExifFixture) {
    create_parent(path);
    let jpeg = encode(&RgbImage::new(8, 8), ImageFormat::Jpeg);
    fs::write(path, with_exif(jpeg, exif)).expect("write jpeg fixture");
}

/// Splices an APP1 EXIF segment directly after the JPEG SOI marker.
fn with_exif(jpeg: Vec<u8>, fixture: &ExifFixture) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(time) = fixture.capture_time {
        fields.push(Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![time.as_bytes().to_vec()]),
        });
    }
    if let Some(model) = fixture.camera_model {
        fields.push(Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![model.as_bytes().to_vec()]),
        });
    }
    if let Some(orientation) = fixture.orientation {
        fields.push(Field {
            tag: Tag::Orientation,
            ifd_num: In::PRIMARY,
            value: Value::Short(vec![orientation]),
        });
    }
    if fields.is_empty() {
        return jpeg;
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).expect("write exif block");
    let tiff = tiff.into_inner();

    let segment_len = u16::try_from(2 + 6 + tiff.len()).expect("exif block fits in APP1");
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs must be creatable");
    }
}
