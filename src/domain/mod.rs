//! Pure domain types with minimal dependencies
//!
//! Annotation records, shape kinds and the frame/vertex geometry shared by
//! the pipeline and the serializer.

pub mod annotation;
pub mod geometry;

pub use annotation::*;
pub use geometry::*;
