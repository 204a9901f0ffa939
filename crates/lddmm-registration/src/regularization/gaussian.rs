//! Gaussian low-pass regularizer.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use lddmm_core::filter::GaussianFilter;

use super::trait_::Regularizer;

/// Separable Gaussian smoothing with a physical standard deviation.
///
/// The same kernel is applied to every component and every time step. The
/// conversion to voxels uses the spacing of the grid being smoothed.
pub struct GaussianRegularizer<B: Backend> {
    smooth_length: f64,
    filter: GaussianFilter<B>,
}

impl<B: Backend> GaussianRegularizer<B> {
    pub fn new(smooth_length: f64) -> Self {
        Self {
            smooth_length,
            filter: GaussianFilter::isotropic(smooth_length),
        }
    }

    pub fn smooth_length(&self) -> f64 {
        self.smooth_length
    }
}

impl<B: Backend> Regularizer<B> for GaussianRegularizer<B> {
    fn smooth(&self, field: Tensor<B, 2>, shape: &[usize], spacing: &[f64]) -> Tensor<B, 2> {
        self.filter.apply_field(field, shape, spacing)
    }
}
