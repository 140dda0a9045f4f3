//! Source loading module
//!
//! This module contains:
//! - EXIF orientation normalization (orientation.rs)
//! - Source image/annotation pairs (image.rs)

pub mod image;
pub mod orientation;

pub use self::image::{SourcePair, sidecar_for, stem_of};
