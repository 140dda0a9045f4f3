//! Geometric operators: pixels and vertices move under one mapping

use image::imageops::{self, FilterType};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{Operator, OperatorClass, Range, Sample};
use crate::domain::Frame;
use crate::error::{AugmentError, Result};
use crate::render::geometry::{
    AffineParams, affine_transform, aspect_crop, map_vertices, mirror_vertices, scale_vertices,
    shift_vertices,
};
use crate::render::image::warp_affine;

/// Mirror left/right with probability `p`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlipHorizontal {
    #[serde(default = "default_flip_p")]
    pub p: f64,
}

fn default_flip_p() -> f64 {
    0.5
}

impl Operator for FlipHorizontal {
    fn name(&self) -> &'static str {
        "flip_horizontal"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Geometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        // Always consume the draw so the stream does not depend on p
        let roll: f64 = rng.random();
        if roll >= self.p.clamp(0.0, 1.0) {
            return Ok(sample);
        }

        let frame = sample.frame();
        imageops::flip_horizontal_in_place(&mut sample.rgb);
        for vertices in sample.vertices_mut() {
            mirror_vertices(frame, vertices);
        }
        Ok(sample)
    }
}

/// Rotate, then scale, then translate; canvas size is kept
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    /// Degrees
    #[serde(default = "zero_range")]
    pub rotate: Range,
    #[serde(default = "unit_range")]
    pub scale: Range,
    /// Fraction of width (x) and height (y), drawn independently per axis
    #[serde(default = "zero_range")]
    pub translate_percent: Range,
}

fn zero_range() -> Range {
    Range::constant(0.0)
}

fn unit_range() -> Range {
    Range::constant(1.0)
}

impl Operator for Affine {
    fn name(&self) -> &'static str {
        "affine"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Geometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        let rotate = self.rotate.draw(self.name(), rng)?;
        let scale = self.scale.draw(self.name(), rng)?;
        let tx = self.translate_percent.draw(self.name(), rng)?;
        let ty = self.translate_percent.draw(self.name(), rng)?;
        if scale <= 0.0 {
            return Err(AugmentError::invalid(
                self.name(),
                format!("scale must be positive, drew {scale}"),
            ));
        }

        let frame = sample.frame();
        let params = AffineParams {
            rotate,
            scale,
            translate_x: tx * frame.width as f64,
            translate_y: ty * frame.height as f64,
        };
        let transform = affine_transform(frame, params);

        sample.rgb = warp_affine(&sample.rgb, transform, frame)?;
        for vertices in sample.vertices_mut() {
            map_vertices(&transform, vertices);
        }
        Ok(sample)
    }
}

/// Where a crop window sits along the cropped axis
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPosition {
    Center,
    /// Random offset, uniform over the valid range
    #[default]
    Uniform,
}

/// Crop the largest window with width/height equal to `ratio`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropToAspectRatio {
    pub ratio: f64,
    #[serde(default)]
    pub position: CropPosition,
}

impl Operator for CropToAspectRatio {
    fn name(&self) -> &'static str {
        "crop_to_aspect_ratio"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Geometric
    }

    fn apply(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        if !self.ratio.is_finite() || self.ratio <= 0.0 {
            return Err(AugmentError::invalid(
                self.name(),
                format!("ratio must be positive, got {}", self.ratio),
            ));
        }

        let offset = match self.position {
            CropPosition::Center => 0.5,
            CropPosition::Uniform => rng.random::<f64>(),
        };

        let frame = sample.frame();
        let window = aspect_crop(frame, self.ratio, offset);
        let size: Frame = window
            .intersect(frame.rect())
            .and_then(|w| w.dimensions())
            .map(Frame::from)
            .ok_or(AugmentError::EmptyFrame {
                width: window.width().max(0) as u32,
                height: window.height().max(0) as u32,
            })?;

        if size == frame {
            return Ok(sample);
        }

        sample.rgb = imageops::crop_imm(
            &sample.rgb,
            window.left as u32,
            window.top as u32,
            size.width,
            size.height,
        )
        .to_image();
        for vertices in sample.vertices_mut() {
            shift_vertices(window, vertices);
        }
        Ok(sample)
    }
}

/// Resize to a fixed frame; each axis scales independently
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl Operator for Resize {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn class(&self) -> OperatorClass {
        OperatorClass::Geometric
    }

    fn apply(&self, mut sample: Sample, _rng: &mut dyn RngCore) -> Result<Sample> {
        let target = Frame::new(self.width, self.height);
        if target.width == 0 || target.height == 0 {
            return Err(AugmentError::EmptyFrame {
                width: target.width,
                height: target.height,
            });
        }

        let frame = sample.frame();
        if frame == target {
            return Ok(sample);
        }

        sample.rgb = imageops::resize(&sample.rgb, target.width, target.height, FilterType::Triangle);
        for vertices in sample.vertices_mut() {
            scale_vertices(frame, target, vertices);
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Point;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(w: u32, h: u32, shapes: Vec<Vec<Point>>) -> Sample {
        Sample {
            rgb: RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 0])),
            shapes,
        }
    }

    #[test]
    fn test_flip_probability_zero_is_noop() {
        let s = sample(10, 10, vec![vec![Point::new(1.0, 2.0)]]);
        let out = FlipHorizontal { p: 0.0 }
            .apply(s.clone(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out, s);
    }

    #[test]
    fn test_flip_moves_pixel_and_vertex_together() {
        // Vertex at the centre of pixel (2, 5) lands on the centre of its mirror
        let mut s = sample(10, 10, vec![vec![Point::new(2.5, 5.5)]]);
        s.rgb.put_pixel(2, 5, Rgb([255, 255, 255]));
        let out = FlipHorizontal { p: 1.0 }
            .apply(s, &mut StdRng::seed_from_u64(0))
            .unwrap();
        let v = out.shapes[0][0];
        assert_eq!(v, Point::new(7.5, 5.5));
        assert_eq!(out.rgb.get_pixel(v.x as u32, v.y as u32), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_affine_rejects_non_positive_scale() {
        let op = Affine {
            rotate: Range::constant(0.0),
            scale: Range::constant(0.0),
            translate_percent: Range::constant(0.0),
        };
        let err = op
            .apply(sample(4, 4, vec![]), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, AugmentError::InvalidParameter { .. }));
    }

    #[test]
    fn test_affine_translation_moves_vertices_by_fraction() {
        let op = Affine {
            rotate: Range::constant(0.0),
            scale: Range::constant(1.0),
            translate_percent: Range::constant(0.1),
        };
        let out = op
            .apply(
                sample(100, 50, vec![vec![Point::new(10.0, 10.0)]]),
                &mut StdRng::seed_from_u64(0),
            )
            .unwrap();
        let v = out.shapes[0][0];
        assert!((v.x - 20.0).abs() < 1e-3);
        assert!((v.y - 15.0).abs() < 1e-3);
        assert_eq!(out.rgb.dimensions(), (100, 50));
    }

    #[test]
    fn test_crop_center_shifts_vertices() {
        let op = CropToAspectRatio {
            ratio: 1.0,
            position: CropPosition::Center,
        };
        let s = sample(40, 20, vec![vec![Point::new(15.0, 5.0), Point::new(30.0, 19.0)]]);
        let out = op.apply(s.clone(), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(out.rgb.dimensions(), (20, 20));
        assert_eq!(out.shapes[0], vec![Point::new(5.0, 5.0), Point::new(20.0, 19.0)]);
        // Pixel (10, 0) of the source is pixel (0, 0) of the crop
        assert_eq!(out.rgb.get_pixel(0, 0), s.rgb.get_pixel(10, 0));
    }

    #[test]
    fn test_crop_uniform_stays_inside() {
        let op = CropToAspectRatio {
            ratio: 0.5,
            position: CropPosition::Uniform,
        };
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..20 {
            let out = op.apply(sample(30, 30, vec![]), &mut rng).unwrap();
            assert_eq!(out.rgb.dimensions(), (15, 30));
        }
    }

    #[test]
    fn test_crop_rejects_bad_ratio() {
        let op = CropToAspectRatio {
            ratio: -1.0,
            position: CropPosition::Center,
        };
        assert!(op.apply(sample(4, 4, vec![]), &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_resize_to_zero_is_an_error() {
        let op = Resize {
            width: 0,
            height: 10,
        };
        assert!(op.apply(sample(4, 4, vec![]), &mut StdRng::seed_from_u64(0)).is_err());
    }
}
