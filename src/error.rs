//! Error types shared by the augmentation core

use thiserror::Error;

use crate::domain::ShapeKind;

/// A shape whose point list cannot describe its kind
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} '{label}' has {found} point(s), expected {}", .kind.point_rule())]
pub struct GeometryError {
    pub label: String,
    pub kind: ShapeKind,
    pub found: usize,
    pub required: usize,
}

#[derive(Debug, Error)]
pub enum AugmentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("annotation json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("png encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("invalid parameter for {operator}: {reason}")]
    InvalidParameter {
        operator: &'static str,
        reason: String,
    },

    #[error("frame collapsed to {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },
}

impl AugmentError {
    pub fn invalid(operator: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operator,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = AugmentError> = std::result::Result<T, E>;
