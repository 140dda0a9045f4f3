//! Writing augmented pairs: `{stem}_{i}.{ext}` plus `{stem}_{i}.json`

use std::io;
use std::path::PathBuf;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use serde_json::Value;

use crate::augment::AugmentedPair;
use crate::config::OutputFormat;
use crate::domain::{Point, ShapeKind, ring_area};
use crate::error::Result;

/// Output base name for one (source, iteration) unit
pub fn output_stem(stem: &str, iteration: u32) -> String {
    format!("{stem}_{iteration}")
}

fn write_png<W: io::Write>(w: W, image: &RgbImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}

/// Encode an RGB buffer in the given format
pub fn encode_image(image: &RgbImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Png => write_png(&mut buffer, image)?,
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100))
                .encode_image(image)?
        }
    }
    Ok(buffer)
}

/// Paths written for one unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenPair {
    pub image: PathBuf,
    pub annotation: PathBuf,
}

/// Serializes augmented pairs into one destination directory
#[derive(Clone, Debug)]
pub struct PairWriter {
    dir: PathBuf,
    format: OutputFormat,
    jpeg_quality: u8,
}

impl PairWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat, jpeg_quality: u8) -> Self {
        Self {
            dir: dir.into(),
            format,
            jpeg_quality,
        }
    }

    /// Write the image and its rewritten annotation.
    ///
    /// `imagePath` becomes the output image's file name and any embedded
    /// `imageData` is cleared since it described the source pixels.
    pub fn write(&self, stem: &str, iteration: u32, pair: AugmentedPair) -> Result<WrittenPair> {
        let base = output_stem(stem, iteration);
        let image_name = format!("{base}.{}", self.format.extension());
        let image_path = self.dir.join(&image_name);
        let json_path = self.dir.join(format!("{base}.json"));

        let AugmentedPair {
            rgb,
            mut annotation,
        } = pair;
        annotation.image_path = image_name;
        annotation.image_width = rgb.width();
        annotation.image_height = rgb.height();
        if let Some(data) = annotation.extra.get_mut("imageData") {
            *data = Value::Null;
        }

        for shape in &annotation.shapes {
            let degenerate = match shape.kind {
                ShapeKind::Polygon => {
                    let ring: Vec<Point> = shape.points.iter().map(|&p| p.into()).collect();
                    ring_area(&ring) == 0.0
                }
                ShapeKind::Rectangle => match shape.points.as_slice() {
                    [a, b] => a[0] == b[0] || a[1] == b[1],
                    _ => true,
                },
            };
            if degenerate {
                log::debug!("{base}: shape '{}' clipped to zero area", shape.label);
            }
        }

        let encoded = encode_image(&rgb, self.format, self.jpeg_quality)?;
        std::fs::write(&image_path, encoded)?;
        std::fs::write(&json_path, annotation.to_json_pretty()?)?;

        log::debug!("Wrote {} and {}", image_path.display(), json_path.display());
        Ok(WrittenPair {
            image: image_path,
            annotation: json_path,
        })
    }
}
