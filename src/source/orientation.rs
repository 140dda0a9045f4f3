//! Orientation normalization from embedded EXIF metadata
//!
//! Cameras store pixels in sensor order and record the upright rotation in
//! EXIF tag 0x0112. Annotations are authored against the upright view, so the
//! buffer is rotated before any vertex is read.

use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};

use crate::error::Result;

/// Rotation applied to a decoded buffer, counter-clockwise
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Ccw90,
    Ccw180,
    Ccw270,
}

impl Rotation {
    /// Rotation implied by a raw EXIF orientation value.
    ///
    /// Only the pure rotations are honoured; mirrored values and anything
    /// unknown leave the buffer as decoded.
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            3 => Some(Rotation::Ccw180),
            6 => Some(Rotation::Ccw270),
            8 => Some(Rotation::Ccw90),
            _ => None,
        }
    }

    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        // image's rotateN helpers turn clockwise
        match self {
            Rotation::Ccw90 => image.rotate270(),
            Rotation::Ccw180 => image.rotate180(),
            Rotation::Ccw270 => image.rotate90(),
        }
    }
}

/// Decoded buffer in the canonical upright frame
pub struct NormalizedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
    pub rotation: Option<Rotation>,
}

/// Decode `bytes` and rotate the result upright.
///
/// Missing, unreadable or unsupported orientation metadata is a no-op.
pub fn decode_upright(bytes: &[u8]) -> Result<NormalizedImage> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let mut decoder = reader.into_decoder()?;

    // Decoders without orientation support report NoTransforms
    let rotation = match decoder.orientation() {
        Ok(orientation) => rotation_for(orientation),
        Err(err) => {
            log::debug!("Ignoring unreadable orientation metadata: {err}");
            None
        }
    };

    let image = DynamicImage::from_decoder(decoder)?;
    let image = match rotation {
        Some(r) => {
            log::debug!(
                "Rotating {}x{} buffer {:?} to upright",
                image.width(),
                image.height(),
                r
            );
            r.apply(image)
        }
        None => image,
    };

    Ok(NormalizedImage {
        image,
        format,
        rotation,
    })
}

fn rotation_for(orientation: Orientation) -> Option<Rotation> {
    Rotation::from_exif(orientation.to_exif())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

    /// Little-endian TIFF block holding a single orientation (0x0112) entry
    fn exif_orientation(value: u16) -> Vec<u8> {
        let mut exif = b"II*\0".to_vec();
        exif.extend(8u32.to_le_bytes());
        exif.extend(1u16.to_le_bytes());
        exif.extend(0x0112u16.to_le_bytes());
        exif.extend(3u16.to_le_bytes());
        exif.extend(1u32.to_le_bytes());
        exif.extend(value.to_le_bytes());
        exif.extend([0, 0]);
        exif.extend(0u32.to_le_bytes());
        exif
    }

    fn encode_with_exif(mut encoder: impl ImageEncoder, img: &RgbImage, value: u16) {
        encoder.set_exif_metadata(exif_orientation(value)).unwrap();
        encoder
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
            .unwrap();
    }

    /// JPEG bytes of `img` tagged with EXIF orientation `value`
    pub(crate) fn jpeg_with_orientation(img: &RgbImage, value: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_with_exif(JpegEncoder::new_with_quality(&mut bytes, 95), img, value);
        bytes
    }

    fn png_with_orientation(img: &RgbImage, value: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_with_exif(PngEncoder::new(&mut bytes), img, value);
        bytes
    }

    fn wide_marked() -> RgbImage {
        let mut img = RgbImage::new(30, 20);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img
    }

    fn marked_image() -> DynamicImage {
        // 3x2 with a single red pixel in the top-left corner
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_exif_value_mapping() {
        assert_eq!(Rotation::from_exif(3), Some(Rotation::Ccw180));
        assert_eq!(Rotation::from_exif(6), Some(Rotation::Ccw270));
        assert_eq!(Rotation::from_exif(8), Some(Rotation::Ccw90));
        for value in [0, 1, 2, 4, 5, 7, 9, 255] {
            assert_eq!(Rotation::from_exif(value), None);
        }
    }

    #[test]
    fn test_rotation_moves_pixels_counter_clockwise() {
        // 90 ccw: top-left corner ends up bottom-left
        let img = Rotation::Ccw90.apply(marked_image()).to_rgb8();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(0, 2), &Rgb([255, 0, 0]));

        // 270 ccw (90 cw): top-left corner ends up top-right
        let img = Rotation::Ccw270.apply(marked_image()).to_rgb8();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(1, 0), &Rgb([255, 0, 0]));

        let img = Rotation::Ccw180.apply(marked_image()).to_rgb8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_png_without_metadata_is_untouched() {
        let mut bytes = Vec::new();
        marked_image()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let first = decode_upright(&bytes).unwrap();
        assert_eq!(first.format, Some(ImageFormat::Png));
        assert_eq!(first.rotation, None);
        assert_eq!(first.image.to_rgb8(), marked_image().to_rgb8());

        // Re-normalizing an already upright buffer changes nothing
        let mut again = Vec::new();
        first
            .image
            .write_to(&mut Cursor::new(&mut again), ImageFormat::Png)
            .unwrap();
        let second = decode_upright(&again).unwrap();
        assert_eq!(second.image.to_rgb8(), first.image.to_rgb8());
    }

    #[test]
    fn test_jpeg_orientation_six_is_rotated_upright() {
        let upright = decode_upright(&jpeg_with_orientation(&wide_marked(), 6)).unwrap();
        assert_eq!(upright.format, Some(ImageFormat::Jpeg));
        assert_eq!(upright.rotation, Some(Rotation::Ccw270));
        assert_eq!((upright.image.width(), upright.image.height()), (20, 30));
    }

    #[test]
    fn test_png_exif_orientation_is_honoured() {
        let upright = decode_upright(&png_with_orientation(&wide_marked(), 6)).unwrap();
        assert_eq!(upright.format, Some(ImageFormat::Png));
        assert_eq!(upright.rotation, Some(Rotation::Ccw270));
        let img = upright.image.to_rgb8();
        assert_eq!(img.dimensions(), (20, 30));
        // Top-left of the stored buffer is top-right once upright
        assert_eq!(img.get_pixel(19, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_other_orientation_values_are_ignored() {
        for value in [1, 2, 5] {
            let decoded = decode_upright(&png_with_orientation(&wide_marked(), value)).unwrap();
            assert_eq!(decoded.rotation, None);
            assert_eq!((decoded.image.width(), decoded.image.height()), (30, 20));
        }
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(decode_upright(b"not an image").is_err());
    }
}
