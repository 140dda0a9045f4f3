//! Source image + annotation pair loaded from disk

use std::path::{Path, PathBuf};

use image::RgbImage;

use super::orientation;
use crate::domain::{Annotation, Frame};
use crate::error::Result;

/// One source item: an upright RGB buffer and its annotation.
///
/// `Clone` copies the pixel buffer and every vertex list, so each augmentation
/// iteration works on state no other iteration can observe.
#[derive(Clone, Debug)]
pub struct SourcePair {
    /// File stem used for output naming
    pub stem: String,
    pub rgb: RgbImage,
    pub annotation: Annotation,
}

impl SourcePair {
    /// Load an image and its sidecar annotation.
    ///
    /// The buffer is rotated upright first; the annotation's declared
    /// dimensions are then reconciled to the buffer. Shapes with too few
    /// points are dropped with a warning.
    pub fn load(image_path: &Path, json_path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(json_path)?;
        let annotation = Annotation::from_json(&text)?;
        let bytes = std::fs::read(image_path)?;
        let stem = stem_of(image_path);
        Self::from_parts(stem, &bytes, annotation)
    }

    /// Build a pair from encoded image bytes and a parsed annotation
    pub fn from_parts(stem: String, bytes: &[u8], mut annotation: Annotation) -> Result<Self> {
        let normalized = orientation::decode_upright(bytes)?;
        let rgb = normalized.image.to_rgb8();
        let frame = Frame::of(&rgb);

        if annotation.image_width != frame.width || annotation.image_height != frame.height {
            log::warn!(
                "{}: annotation declares {}x{}, upright image is {}x{}; using image size",
                stem,
                annotation.image_width,
                annotation.image_height,
                frame.width,
                frame.height
            );
            annotation.image_width = frame.width;
            annotation.image_height = frame.height;
        }

        for err in annotation.retain_valid_shapes() {
            log::warn!("{stem}: dropping shape: {err}");
        }

        log::debug!(
            "Loaded {}: {}x{} pixels, {} shape(s)",
            stem,
            frame.width,
            frame.height,
            annotation.shapes.len()
        );

        Ok(Self {
            stem,
            rgb,
            annotation,
        })
    }

    pub fn frame(&self) -> Frame {
        Frame::of(&self.rgb)
    }
}

/// File stem as a string (lossy for non-UTF-8 names)
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sidecar annotation path for an image: same directory and stem, `.json`
pub fn sidecar_for(image_path: &Path) -> PathBuf {
    image_path.with_extension("json")
}
