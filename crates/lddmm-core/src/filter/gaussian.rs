use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::separable::{gaussian_kernel, smooth_along_axis};
use crate::image::Image;

/// Gaussian smoothing filter.
///
/// Applies a Gaussian low-pass filter one axis at a time. Standard deviations
/// are given in physical units and converted to voxels with the spacing of
/// the data being filtered. Kernels are truncated at three standard
/// deviations and renormalised at the grid boundary, so constant fields are
/// preserved.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter with the given standard deviations (physical units).
    ///
    /// A single value is used for every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            _b: std::marker::PhantomData,
        }
    }

    /// Same standard deviation on every axis.
    pub fn isotropic(sigma: f64) -> Self {
        Self::new(vec![sigma])
    }

    fn sigma(&self, axis: usize) -> f64 {
        self.sigmas
            .get(axis)
            .or_else(|| self.sigmas.first())
            .copied()
            .unwrap_or(0.0)
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let shape = image.shape();
        let smoothed = self.apply_field(image.to_column(), &shape, &image.spacing().to_vec());
        Image::from_column(smoothed, shape, *image.spacing())
    }

    /// Apply the filter to every channel of a flattened `[N, C]` field.
    ///
    /// # Arguments
    /// * `field` - Row-major samples of a grid with `shape`
    /// * `spacing` - Physical spacing of the grid
    pub fn apply_field(&self, field: Tensor<B, 2>, shape: &[usize], spacing: &[f64]) -> Tensor<B, 2> {
        let mut data = field;
        for axis in 0..shape.len() {
            let sigma = self.sigma(axis);
            // Skip if sigma is close to zero
            if sigma <= 1e-6 || shape[axis] < 2 {
                continue;
            }
            let kernel = gaussian_kernel(sigma / spacing[axis], shape[axis] - 1);
            data = smooth_along_axis(data, shape, axis, &kernel);
        }
        data
    }
}
