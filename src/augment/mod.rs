//! Annotation-synchronized augmentation pipeline
//!
//! A [`Pipeline`] threads one [`Sample`] (pixels plus every shape's vertex
//! list) through its operators in configured order. Geometric operators move
//! pixels and vertices with one shared mapping; photometric operators touch
//! pixels only. Every random parameter is drawn from the RNG passed to
//! [`Pipeline::augment`], so one call is one augmentation draw.

pub mod geometric;
pub mod photometric;

use std::fmt;

use image::RgbImage;
use rand::distr::Uniform;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::domain::{Annotation, Frame, Point, clip_vertices};
use crate::error::{AugmentError, Result};
use crate::source::SourcePair;

pub use geometric::{Affine, CropPosition, CropToAspectRatio, FlipHorizontal, Resize};
pub use photometric::{
    AdditiveGaussianNoise, Desaturate, GaussianBlur, LinearContrast, Multiply,
};

/// Pixels and vertex lists moving through the pipeline together
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub rgb: RgbImage,
    /// One vertex list per shape, in annotation order
    pub shapes: Vec<Vec<Point>>,
}

impl Sample {
    pub fn frame(&self) -> Frame {
        Frame::of(&self.rgb)
    }

    /// Visit every vertex of every shape
    pub fn vertices_mut(&mut self) -> impl Iterator<Item = &mut [Point]> {
        self.shapes.iter_mut().map(Vec::as_mut_slice)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorClass {
    /// Moves pixels; vertices follow
    Geometric,
    /// Changes pixel values only
    Photometric,
}

/// One configured transform step
pub trait Operator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn class(&self) -> OperatorClass;

    /// Draw fresh parameters from `rng` and transform the sample
    fn apply(&self, sample: Sample, rng: &mut dyn RngCore) -> Result<Sample>;
}

/// Closed interval `[min, max]` a parameter is drawn from, written `[min, max]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn constant(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Uniform draw; inverted or non-finite bounds are an error
    pub fn draw(&self, operator: &'static str, rng: &mut dyn RngCore) -> Result<f64> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(AugmentError::invalid(
                operator,
                format!("non-finite range [{}, {}]", self.min, self.max),
            ));
        }
        if self.min > self.max {
            return Err(AugmentError::invalid(
                operator,
                format!("inverted range [{}, {}]", self.min, self.max),
            ));
        }
        // Finite bounds can still span more than f64::MAX
        let uniform = Uniform::new_inclusive(self.min, self.max).map_err(|err| {
            AugmentError::invalid(
                operator,
                format!("unusable range [{}, {}]: {err}", self.min, self.max),
            )
        })?;
        Ok(rng.sample(uniform))
    }

    /// Draw and require the value to lie in `[lo, hi]`
    pub fn draw_within(
        &self,
        operator: &'static str,
        rng: &mut dyn RngCore,
        lo: f64,
        hi: f64,
    ) -> Result<f64> {
        let value = self.draw(operator, rng)?;
        if value < lo || value > hi {
            return Err(AugmentError::invalid(
                operator,
                format!("drew {value}, allowed [{lo}, {hi}]"),
            ));
        }
        Ok(value)
    }
}

impl From<[f64; 2]> for Range {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Range> for [f64; 2] {
    fn from(r: Range) -> Self {
        [r.min, r.max]
    }
}

/// Serializable operator configuration, tagged by `"op"`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperatorSpec {
    FlipHorizontal(FlipHorizontal),
    Affine(Affine),
    CropToAspectRatio(CropToAspectRatio),
    Resize(Resize),
    Multiply(Multiply),
    GaussianBlur(GaussianBlur),
    AdditiveGaussianNoise(AdditiveGaussianNoise),
    LinearContrast(LinearContrast),
    Desaturate(Desaturate),
}

impl OperatorSpec {
    pub fn build(&self) -> Box<dyn Operator> {
        match self {
            OperatorSpec::FlipHorizontal(op) => Box::new(op.clone()),
            OperatorSpec::Affine(op) => Box::new(op.clone()),
            OperatorSpec::CropToAspectRatio(op) => Box::new(op.clone()),
            OperatorSpec::Resize(op) => Box::new(op.clone()),
            OperatorSpec::Multiply(op) => Box::new(op.clone()),
            OperatorSpec::GaussianBlur(op) => Box::new(op.clone()),
            OperatorSpec::AdditiveGaussianNoise(op) => Box::new(op.clone()),
            OperatorSpec::LinearContrast(op) => Box::new(op.clone()),
            OperatorSpec::Desaturate(op) => Box::new(op.clone()),
        }
    }
}

/// Result of one augmentation draw
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentedPair {
    pub rgb: RgbImage,
    pub annotation: Annotation,
}

/// Ordered composition of operators
#[derive(Debug)]
pub struct Pipeline {
    operators: Vec<Box<dyn Operator>>,
    round_vertices: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Empty pipeline; vertices are rounded to whole pixels
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
            round_vertices: true,
        }
    }

    pub fn from_specs(specs: &[OperatorSpec]) -> Self {
        specs
            .iter()
            .fold(Self::new(), |pipeline, spec| pipeline.then(spec.build()))
    }

    /// Append an operator
    pub fn then(mut self, operator: Box<dyn Operator>) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn round_vertices(mut self, round: bool) -> Self {
        self.round_vertices = round;
        self
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operator names in execution order
    pub fn describe(&self) -> Vec<&'static str> {
        self.operators.iter().map(|op| op.name()).collect()
    }

    /// Run every operator in order, then clip vertices to the final frame
    pub fn run(&self, mut sample: Sample, rng: &mut dyn RngCore) -> Result<Sample> {
        for op in &self.operators {
            let before = sample.frame();
            sample = op.apply(sample, rng)?;
            let after = sample.frame();
            if after.width == 0 || after.height == 0 {
                return Err(AugmentError::EmptyFrame {
                    width: after.width,
                    height: after.height,
                });
            }
            if before != after {
                log::trace!(
                    "{} ({:?}) changed frame {}x{} -> {}x{}",
                    op.name(),
                    op.class(),
                    before.width,
                    before.height,
                    after.width,
                    after.height
                );
            }
        }

        let frame = sample.frame();
        for vertices in sample.vertices_mut() {
            clip_vertices(vertices, frame);
        }
        Ok(sample)
    }

    /// Produce one augmented pair from a source.
    ///
    /// The source is only read; the result owns fresh copies of the pixels
    /// and of every shape.
    pub fn augment(&self, source: &SourcePair, rng: &mut dyn RngCore) -> Result<AugmentedPair> {
        let round = self.round_vertices;
        let sample = Sample {
            rgb: source.rgb.clone(),
            shapes: source
                .annotation
                .shapes
                .iter()
                .map(|shape| shape.vertices(round))
                .collect(),
        };

        let sample = self.run(sample, rng)?;
        let frame = sample.frame();

        let mut annotation = source.annotation.clone();
        annotation.shapes = source
            .annotation
            .shapes
            .iter()
            .zip(&sample.shapes)
            .map(|(shape, vertices)| shape.with_vertices(vertices, round))
            .collect();
        annotation.image_width = frame.width;
        annotation.image_height = frame.height;

        Ok(AugmentedPair {
            rgb: sample.rgb,
            annotation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Shape, ShapeKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn cat_source() -> SourcePair {
        let mut rgb = RgbImage::new(640, 480);
        for (x, y, px) in rgb.enumerate_pixels_mut() {
            *px = image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
        SourcePair {
            stem: "cat".into(),
            rgb,
            annotation: Annotation {
                image_width: 640,
                image_height: 480,
                image_path: "cat.jpg".into(),
                shapes: vec![Shape::new(
                    "cat",
                    ShapeKind::Rectangle,
                    vec![[100.0, 100.0], [300.0, 300.0]],
                )],
                extra: Default::default(),
            },
        }
    }

    fn with_polygon(mut source: SourcePair) -> SourcePair {
        source.annotation.shapes.push(Shape::new(
            "leaf",
            ShapeKind::Polygon,
            vec![[600.0, 20.0], [630.0, 60.0], [590.0, 470.0], [560.0, 300.0]],
        ));
        source
    }

    fn default_like() -> Pipeline {
        Pipeline::new()
            .then(Box::new(FlipHorizontal { p: 0.5 }))
            .then(Box::new(Affine {
                rotate: Range::new(-45.0, 45.0),
                scale: Range::new(0.5, 1.2),
                translate_percent: Range::constant(0.0),
            }))
            .then(Box::new(Multiply {
                factor: Range::new(0.5, 1.2),
            }))
            .then(Box::new(GaussianBlur {
                sigma: Range::new(0.0, 1.0),
            }))
    }

    #[test]
    fn test_identity_pipeline_round_trips() {
        let source = with_polygon(cat_source());
        let mut rng = StdRng::seed_from_u64(1);
        let out = Pipeline::new().augment(&source, &mut rng).unwrap();
        assert_eq!(out.rgb, source.rgb);
        assert_eq!(out.annotation, source.annotation);
    }

    #[test]
    fn test_horizontal_flip_scenario() {
        let source = cat_source();
        let mut rng = StdRng::seed_from_u64(7);
        let pipeline = Pipeline::new().then(Box::new(FlipHorizontal { p: 1.0 }));
        let out = pipeline.augment(&source, &mut rng).unwrap();

        let shape = &out.annotation.shapes[0];
        assert_eq!(shape.points, vec![[340.0, 100.0], [540.0, 300.0]]);
        assert_eq!(shape.label, "cat");
        assert_eq!(shape.kind, ShapeKind::Rectangle);
        assert_eq!((out.annotation.image_width, out.annotation.image_height), (640, 480));
        assert_eq!(out.rgb.get_pixel(639, 0), source.rgb.get_pixel(0, 0));
    }

    #[test]
    fn test_resize_scenario() {
        let source = cat_source();
        let mut rng = StdRng::seed_from_u64(7);
        let pipeline = Pipeline::new().then(Box::new(Resize {
            width: 320,
            height: 240,
        }));
        let out = pipeline.augment(&source, &mut rng).unwrap();
        assert_eq!(out.annotation.shapes[0].points, vec![[50.0, 50.0], [150.0, 150.0]]);
        assert_eq!(out.annotation.image_width, 320);
        assert_eq!(out.annotation.image_height, 240);
        assert_eq!(out.rgb.dimensions(), (320, 240));
    }

    #[test]
    fn test_vertex_count_and_labels_preserved() {
        let source = with_polygon(cat_source());
        let pipeline = default_like().then(Box::new(CropToAspectRatio {
            ratio: 1.0,
            position: CropPosition::Uniform,
        }));
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..8 {
            let out = pipeline.augment(&source, &mut rng).unwrap();
            assert_eq!(out.annotation.label_kinds(), source.annotation.label_kinds());
            for (a, b) in out.annotation.shapes.iter().zip(&source.annotation.shapes) {
                assert_eq!(a.points.len(), b.points.len());
            }
        }
    }

    #[test]
    fn test_crop_then_resize_frame_invariant() {
        let source = with_polygon(cat_source());
        let pipeline = default_like()
            .then(Box::new(CropToAspectRatio {
                ratio: 1.0,
                position: CropPosition::Uniform,
            }))
            .then(Box::new(Resize {
                width: 256,
                height: 256,
            }));
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..6 {
            let out = pipeline.augment(&source, &mut rng).unwrap();
            assert_eq!(out.annotation.image_width, 256);
            assert_eq!(out.annotation.image_height, 256);
            for shape in &out.annotation.shapes {
                for [x, y] in &shape.points {
                    assert!((0.0..=255.0).contains(x), "x = {x}");
                    assert!((0.0..=255.0).contains(y), "y = {y}");
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let source = with_polygon(cat_source());
        let pipeline = default_like();
        let a = pipeline
            .augment(&source, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = pipeline
            .augment(&source, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_consecutive_draws_differ() {
        let source = cat_source();
        let pipeline = Pipeline::new().then(Box::new(Affine {
            rotate: Range::new(-45.0, 45.0),
            scale: Range::constant(1.0),
            translate_percent: Range::constant(0.0),
        }));
        let mut rng = StdRng::seed_from_u64(5);
        let a = pipeline.augment(&source, &mut rng).unwrap();
        let b = pipeline.augment(&source, &mut rng).unwrap();
        assert_ne!(a.annotation.shapes[0].points, b.annotation.shapes[0].points);
    }

    #[test]
    fn test_invalid_draw_fails_the_iteration() {
        let source = cat_source();
        let pipeline = Pipeline::new().then(Box::new(Multiply {
            factor: Range::new(1.5, 0.5),
        }));
        let err = pipeline
            .augment(&source, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, AugmentError::InvalidParameter { operator: "multiply", .. }));
    }

    #[test]
    fn test_overflowing_range_is_an_error() {
        let range = Range::new(-1e308, 1e308);
        let err = range
            .draw("affine", &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, AugmentError::InvalidParameter { operator: "affine", .. }));

        let pipeline = Pipeline::new().then(Box::new(Affine {
            rotate: range,
            scale: Range::constant(1.0),
            translate_percent: Range::constant(0.0),
        }));
        assert!(pipeline.augment(&cat_source(), &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_specs_deserialize_and_build() {
        let text = r#"[
            {"op": "flip_horizontal", "p": 0.5},
            {"op": "affine", "rotate": [-45, 45], "scale": [0.5, 1.2]},
            {"op": "crop_to_aspect_ratio", "ratio": 1.0, "position": "center"},
            {"op": "resize", "width": 320, "height": 240},
            {"op": "multiply", "factor": [0.5, 1.2]},
            {"op": "gaussian_blur", "sigma": [0.0, 1.0]},
            {"op": "additive_gaussian_noise", "scale": [0.0, 12.75]},
            {"op": "linear_contrast", "alpha": [0.75, 1.5]},
            {"op": "desaturate", "amount": [0.0, 0.5]}
        ]"#;
        let specs: Vec<OperatorSpec> = serde_json::from_str(text).unwrap();
        let pipeline = Pipeline::from_specs(&specs);
        assert_eq!(
            pipeline.describe(),
            vec![
                "flip_horizontal",
                "affine",
                "crop_to_aspect_ratio",
                "resize",
                "multiply",
                "gaussian_blur",
                "additive_gaussian_noise",
                "linear_contrast",
                "desaturate"
            ]
        );

        let out = pipeline
            .augment(&cat_source(), &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert_eq!(out.rgb.dimensions(), (320, 240));
        assert_eq!(out.annotation.shapes[0].points.len(), 2);
    }
}
