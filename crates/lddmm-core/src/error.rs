//! Error types for core image operations.
//!
//! Every variant describes an invalid input (bad factor, bad spacing, bad
//! shape). They are raised before any numerical work starts.

use thiserror::Error;

/// Error type for image, filter and transform construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A resampling factor was zero, negative or not finite.
    #[error("Invalid factor {factor} on axis {axis}: factors must be positive and finite")]
    InvalidFactor { axis: usize, factor: f64 },

    /// A resampling operation would leave an axis with no voxels.
    #[error("Axis {axis} of length {length} shrinks below one voxel with factor {factor}")]
    EmptyGrid {
        axis: usize,
        length: usize,
        factor: f64,
    },

    /// A spacing component was zero, negative or not finite.
    #[error("Invalid spacing {spacing} on axis {axis}: spacing must be positive and finite")]
    InvalidSpacing { axis: usize, spacing: f64 },

    /// Shape or length mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
