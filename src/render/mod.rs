//! Geometry rendering module
//!
//! This module contains:
//! - Coordinate mappings shared by pixels and vertices (geometry.rs)
//! - Pixel warping using tiny-skia (image.rs)

pub mod geometry;
pub mod image;
