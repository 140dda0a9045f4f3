//! Annotation-synchronized image augmentation for detection and
//! segmentation datasets.
//!
//! A source image and its LabelMe-style annotation are loaded upright,
//! pushed through an operator [`Pipeline`](augment::Pipeline) that moves
//! pixels and vertices together, clipped to the final frame and written
//! back as `{stem}_{i}` pairs.

pub mod augment;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod output;
pub mod render;
pub mod source;

pub use augment::{AugmentedPair, Operator, OperatorSpec, Pipeline, Range, Sample};
pub use batch::{BatchReport, discover_items, run_batch};
pub use config::{AugmentConfig, OutputFormat};
pub use error::{AugmentError, GeometryError, Result};
pub use export::{ExportKind, export_labels};
pub use output::PairWriter;
pub use source::SourcePair;
