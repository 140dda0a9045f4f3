//! LabelMe-style annotation records and their working vertex lists
//!
//! Coordinates are image pixels of the canonical upright frame. Fields the
//! augmenter does not interpret are kept in `extra` and written back as-is.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::geometry::{self, Point};
use crate::error::GeometryError;

/// Kind of an annotated region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Two opposite corners
    Rectangle,
    /// Closed ring of at least three vertices
    Polygon,
}

impl ShapeKind {
    /// Minimum number of stored points for this kind
    pub fn min_points(self) -> usize {
        match self {
            ShapeKind::Rectangle => 2,
            ShapeKind::Polygon => 3,
        }
    }

    /// Rectangles take exactly two corners, polygons any count from three
    pub fn accepts(self, count: usize) -> bool {
        match self {
            ShapeKind::Rectangle => count == 2,
            ShapeKind::Polygon => count >= 3,
        }
    }

    /// Human-readable point count rule
    pub fn point_rule(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "exactly 2",
            ShapeKind::Polygon => "at least 3",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Polygon => "polygon",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One labeled region
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub label: String,
    #[serde(rename = "shape_type")]
    pub kind: ShapeKind,
    pub points: Vec<[f64; 2]>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Shape {
    pub fn new(label: impl Into<String>, kind: ShapeKind, points: Vec<[f64; 2]>) -> Self {
        Self {
            label: label.into(),
            kind,
            points,
            extra: Map::new(),
        }
    }

    /// Check the point count against the kind's rule
    pub fn validate(&self) -> Result<(), GeometryError> {
        let required = self.kind.min_points();
        if !self.kind.accepts(self.points.len()) {
            return Err(GeometryError {
                label: self.label.clone(),
                kind: self.kind,
                found: self.points.len(),
                required,
            });
        }
        Ok(())
    }

    /// Working vertex list for the pipeline.
    ///
    /// Rectangles become their four corners (clockwise from the first stored
    /// corner) so rotations move the whole box; polygons are passed through.
    /// An unvalidated rectangle with extra points is reduced to its bounds.
    pub fn vertices(&self, round: bool) -> Vec<Point> {
        let points = self.points.iter().map(|&p| {
            let p = Point::from(p);
            if round { p.rounded() } else { p }
        });
        match self.kind {
            ShapeKind::Polygon => points.collect(),
            ShapeKind::Rectangle => {
                let pts: Vec<Point> = points.collect();
                let (x0, y0, x1, y1) = if pts.len() == 2 {
                    (pts[0].x, pts[0].y, pts[1].x, pts[1].y)
                } else {
                    geometry::bounds(&pts).unwrap_or_default()
                };
                vec![
                    Point::new(x0, y0),
                    Point::new(x1, y0),
                    Point::new(x1, y1),
                    Point::new(x0, y1),
                ]
            }
        }
    }

    /// Copy of this shape carrying transformed vertices.
    ///
    /// Rectangle corners are collapsed back to the axis-aligned
    /// (top-left, bottom-right) pair.
    pub fn with_vertices(&self, vertices: &[Point], round: bool) -> Shape {
        let finish = |p: Point| -> [f64; 2] {
            if round { p.rounded().into() } else { p.into() }
        };
        let points = match self.kind {
            ShapeKind::Polygon => vertices.iter().copied().map(finish).collect(),
            ShapeKind::Rectangle => match geometry::bounds(vertices) {
                Some((min_x, min_y, max_x, max_y)) => vec![
                    finish(Point::new(min_x, min_y)),
                    finish(Point::new(max_x, max_y)),
                ],
                None => Vec::new(),
            },
        };
        Shape {
            label: self.label.clone(),
            kind: self.kind,
            points,
            extra: self.extra.clone(),
        }
    }
}

/// Annotation record for one image
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub image_width: u32,
    pub image_height: u32,
    pub image_path: String,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Pretty JSON with 4-space indentation
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        Ok(out)
    }

    /// Drop shapes that fail validation, returning the errors
    pub fn retain_valid_shapes(&mut self) -> Vec<GeometryError> {
        let mut errors = Vec::new();
        self.shapes.retain(|shape| match shape.validate() {
            Ok(()) => true,
            Err(err) => {
                errors.push(err);
                false
            }
        });
        errors
    }

    /// Multiset of (label, kind) pairs, sorted
    pub fn label_kinds(&self) -> Vec<(String, ShapeKind)> {
        let mut pairs: Vec<_> = self
            .shapes
            .iter()
            .map(|s| (s.label.clone(), s.kind))
            .collect();
        pairs.sort();
        pairs
    }
}
