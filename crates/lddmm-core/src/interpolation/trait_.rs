//! Interpolator trait for sampling values at continuous coordinates.
//!
//! This module defines the core Interpolator trait that all interpolation
//! methods implement, and the policy used outside the sampled grid.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Value assigned to coordinates outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Clamp coordinates to the nearest edge voxel.
    Nearest,
    /// Return a fixed value outside the grid.
    Constant(f64),
}

impl Default for BoundaryMode {
    fn default() -> Self {
        Self::Nearest
    }
}

/// Interpolator trait for sampling values at continuous coordinates.
///
/// Interpolators sample flattened grid data at non-integer indices.
/// Coordinates outside the grid never fail; they follow the interpolator's
/// [`BoundaryMode`].
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate a multi-channel field at continuous indices.
    ///
    /// # Arguments
    /// * `field` - Row-major samples `[N, C]` of a grid with `shape`
    /// * `shape` - Grid shape, its length is the rank
    /// * `indices` - Continuous indices `[K, rank]`
    ///
    /// # Returns
    /// Tensor of sampled values `[K, C]`
    fn interpolate_field(
        &self,
        field: &Tensor<B, 2>,
        shape: &[usize],
        indices: Tensor<B, 2>,
    ) -> Tensor<B, 2>;

    /// Interpolate a scalar volume at continuous indices `[K, D]`.
    ///
    /// # Returns
    /// Tensor of sampled values `[K]`
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let total = shape.iter().product::<usize>();
        let [count, _] = indices.dims();
        let field = data.clone().reshape([total, 1]);
        self.interpolate_field(&field, &shape, indices).reshape([count])
    }
}
