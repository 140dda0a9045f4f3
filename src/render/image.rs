//! Raster warping with tiny-skia
//!
//! The RGB working buffer is lifted into an opaque pixmap, drawn through a
//! transform onto a transparent canvas, and flattened back onto black.

use image::{DynamicImage, RgbImage};
use tiny_skia::{FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};

use crate::domain::Frame;
use crate::error::{AugmentError, Result};

/// Convert an RGB buffer to an opaque pixmap
fn to_pixmap(img: &RgbImage) -> Result<Pixmap> {
    let (w, h) = img.dimensions();
    let rgba = DynamicImage::ImageRgb8(img.clone()).to_rgba8();
    IntSize::from_wh(w, h)
        .and_then(|size| Pixmap::from_vec(rgba.into_raw(), size))
        .ok_or(AugmentError::EmptyFrame {
            width: w,
            height: h,
        })
}

/// Flatten a premultiplied pixmap onto black
fn from_pixmap(pixmap: &Pixmap) -> RgbImage {
    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
        .unwrap_or_else(|| RgbImage::new(pixmap.width(), pixmap.height()))
}

/// Warp `img` through `transform` onto a canvas of `out` size.
///
/// Bilinear sampling; pixels with no source coverage are black.
pub fn warp_affine(img: &RgbImage, transform: Transform, out: Frame) -> Result<RgbImage> {
    let src = to_pixmap(img)?;
    let mut canvas = Pixmap::new(out.width, out.height).ok_or(AugmentError::EmptyFrame {
        width: out.width,
        height: out.height,
    })?;

    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..Default::default()
    };
    canvas.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);

    Ok(from_pixmap(&canvas))
}
