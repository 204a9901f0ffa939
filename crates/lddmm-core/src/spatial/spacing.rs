//! Spacing type for representing physical distances between voxels.
//!
//! Spacing represents the physical distance between adjacent voxels
//! along each axis of an image.

use super::Vector;
use crate::error::{CoreError, Result};

/// Spacing between adjacent voxels along each axis.
///
/// This is a type alias to Vector for semantic clarity.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Create uniform spacing (same value for all dimensions).
    pub fn uniform(value: f64) -> Self {
        Vector::repeat(value)
    }

    /// Check if spacing is uniform (all components equal).
    pub fn is_uniform(&self) -> bool {
        if D == 0 {
            return true;
        }
        let first = self[0];
        (1..D).all(|i| (self[i] - first).abs() < 1e-9)
    }

    /// Get the minimum spacing value.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, |a, b| a.min(b))
    }

    /// Get the maximum spacing value.
    pub fn max_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::NEG_INFINITY, |a, b| a.max(b))
    }

    /// Reject zero, negative or non-finite components.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..D {
            let spacing = self[axis];
            if !spacing.is_finite() || spacing <= 0.0 {
                return Err(CoreError::InvalidSpacing { axis, spacing });
            }
        }
        Ok(())
    }
}

impl<const D: usize> Default for Spacing<D> {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}
