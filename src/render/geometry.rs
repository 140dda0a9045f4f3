//! Coordinate mappings shared between pixel warping and vertex mapping
//!
//! Every geometric operator builds its mapping here once and hands the same
//! value to both the raster path and the vertex path.

use tiny_skia::Transform;

use crate::domain::{Frame, Point, Rect};

/// Affine parameters in the order they are applied
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineParams {
    /// Degrees, positive turns clockwise on screen (y points down)
    pub rotate: f64,
    /// Uniform scale about the frame centre
    pub scale: f64,
    /// Translation in pixels
    pub translate_x: f64,
    pub translate_y: f64,
}

impl AffineParams {
    pub const IDENTITY: Self = Self {
        rotate: 0.0,
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };
}

/// Build `p' = S·R·(p − c) + c + t` with `c` the frame centre.
///
/// Rotation first, then scale, then translation.
pub fn affine_transform(frame: Frame, params: AffineParams) -> Transform {
    let cx = frame.width as f64 * 0.5;
    let cy = frame.height as f64 * 0.5;
    let (sin, cos) = params.rotate.to_radians().sin_cos();

    let a = params.scale * cos;
    let b = -params.scale * sin;
    let c = params.scale * sin;
    let d = params.scale * cos;
    let tx = cx + params.translate_x - a * cx - b * cy;
    let ty = cy + params.translate_y - c * cx - d * cy;

    Transform::from_row(a as f32, c as f32, b as f32, d as f32, tx as f32, ty as f32)
}

/// Map vertices through the same matrix used for the pixels
pub fn map_vertices(transform: &Transform, vertices: &mut [Point]) {
    let (sx, kx, ky, sy) = (
        transform.sx as f64,
        transform.kx as f64,
        transform.ky as f64,
        transform.sy as f64,
    );
    let (tx, ty) = (transform.tx as f64, transform.ty as f64);
    for v in vertices {
        let (x, y) = (v.x, v.y);
        v.x = sx * x + kx * y + tx;
        v.y = ky * x + sy * y + ty;
    }
}

/// Largest window of `frame` with width/height equal to `ratio`.
///
/// `offset` in `[0, 1]` places the window along the axis being cropped:
/// 0 is left/top, 0.5 centred, 1 right/bottom.
pub fn aspect_crop(frame: Frame, ratio: f64, offset: f64) -> Rect {
    let (w, h) = (frame.width as f64, frame.height as f64);
    let offset = offset.clamp(0.0, 1.0);
    if frame.aspect_ratio() > ratio {
        let crop_w = (h * ratio).round().clamp(1.0, w);
        let left = ((w - crop_w) * offset).round();
        Rect::new(left as i32, 0, (left + crop_w) as i32, frame.height as i32)
    } else {
        let crop_h = (w / ratio).round().clamp(1.0, h);
        let top = ((h - crop_h) * offset).round();
        Rect::new(0, top as i32, frame.width as i32, (top + crop_h) as i32)
    }
}

/// Shift vertices into a crop window's coordinate system
pub fn shift_vertices(window: Rect, vertices: &mut [Point]) {
    let (dx, dy) = (window.left as f64, window.top as f64);
    for v in vertices {
        v.x -= dx;
        v.y -= dy;
    }
}

/// Scale vertices by the ratio between two frames
pub fn scale_vertices(from: Frame, to: Frame, vertices: &mut [Point]) {
    let fx = to.width as f64 / from.width.max(1) as f64;
    let fy = to.height as f64 / from.height.max(1) as f64;
    for v in vertices {
        v.x *= fx;
        v.y *= fy;
    }
}

/// Mirror vertices across the vertical centre line: `x' = width − x`
pub fn mirror_vertices(frame: Frame, vertices: &mut [Point]) {
    let w = frame.width as f64;
    for v in vertices {
        v.x = w - v.x;
    }
}
