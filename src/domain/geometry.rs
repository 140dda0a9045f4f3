//! Geometric types for image frames, crop windows and annotation vertices

use std::num::NonZeroU32;

/// A vertex in image pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both coordinates half away from zero, keeping them as floats
    pub fn rounded(self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
        }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Pixel dimensions of an image buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Frame of an `image` buffer
    pub fn of<I: image::GenericImageView>(img: &I) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Whole-frame rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// Integer pixel rectangle, used for crop windows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Calculate the intersection of two rectangles
    pub fn intersect(&self, other: Rect) -> Option<Rect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);
        if left < right && top < bottom {
            Some(Rect {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Convert to dimensions (NonZeroU32 width and height)
    pub fn dimensions(self) -> Option<RectDimension> {
        let width = NonZeroU32::new((self.width()).unsigned_abs())?;
        let height = NonZeroU32::new((self.height()).unsigned_abs())?;
        Some(RectDimension { width, height })
    }
}

/// Non-zero dimensions of a rectangle
#[derive(Clone, Copy, Debug)]
pub struct RectDimension {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

impl From<RectDimension> for Frame {
    fn from(d: RectDimension) -> Self {
        Frame::new(d.width.get(), d.height.get())
    }
}

/// Axis-aligned bounds of a vertex list as `(min_x, min_y, max_x, max_y)`
pub fn bounds(points: &[Point]) -> Option<(f64, f64, f64, f64)> {
    let first = points.first()?;
    Some(points.iter().skip(1).fold(
        (first.x, first.y, first.x, first.y),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
        },
    ))
}

/// Clamp every vertex into `[0, width-1] x [0, height-1]`.
///
/// Order and count are preserved: collapsed neighbours stay as separate
/// vertices and a zero-area result is a valid shape.
pub fn clip_vertices(vertices: &mut [Point], frame: Frame) {
    let max_x = frame.width.saturating_sub(1) as f64;
    let max_y = frame.height.saturating_sub(1) as f64;
    for v in vertices {
        v.x = v.x.clamp(0.0, max_x);
        v.y = v.y.clamp(0.0, max_y);
    }
}

/// Signed shoelace area of a closed ring
pub fn ring_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice * 0.5
}
