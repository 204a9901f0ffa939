//! Regularizer trait definition.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Linear smoothing operator applied to velocity gradients.
///
/// # Type Parameters
/// * `B` - The backend type
pub trait Regularizer<B: Backend> {
    /// Smooth a flattened `[N, C]` field sampled on a grid.
    ///
    /// # Arguments
    /// * `field` - Row-major field samples
    /// * `shape` - Grid shape
    /// * `spacing` - Physical spacing of the grid
    fn smooth(&self, field: Tensor<B, 2>, shape: &[usize], spacing: &[f64]) -> Tensor<B, 2>;
}
