//! Image type with physical spacing and centered coordinates.
//!
//! This module provides the Image struct which couples tensor data with the
//! per-axis voxel spacing. Physical coordinates are centered on the middle of
//! the grid, so two images of different shapes share the same physical center.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use super::grid;
use crate::error::{CoreError, Result};
use crate::spatial::Spacing;

/// N-dimensional scalar image.
///
/// # Type Parameters
/// * `B` - The backend for tensor operations
/// * `D` - The dimensionality of the image
///
/// # Coordinate Systems
/// * **Index Space**: Discrete voxel indices
/// * **Physical Space**: `(index - (n - 1) / 2) * spacing` along each axis
///
/// # Examples
/// ```rust
/// use lddmm_core::Image;
/// use lddmm_core::spatial::Spacing2;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 2>::zeros([10, 12], &device);
/// let image = Image::new(data, Spacing2::new([1.0, 2.0]));
/// assert_eq!(image.shape(), [10, 12]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    spacing: Spacing<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and spacing.
    pub fn new(data: Tensor<B, D>, spacing: Spacing<D>) -> Self {
        Self { data, spacing }
    }

    /// Create an image with unit spacing on every axis.
    pub fn with_unit_spacing(data: Tensor<B, D>) -> Self {
        Self::new(data, Spacing::uniform(1.0))
    }

    /// Create an image from row-major samples.
    ///
    /// Fails with [`CoreError::ShapeMismatch`] when the number of samples
    /// does not match the shape.
    pub fn from_values(
        values: Vec<f64>,
        shape: [usize; D],
        spacing: Spacing<D>,
        device: &B::Device,
    ) -> Result<Self> {
        let total = grid::num_voxels(&shape);
        if values.len() != total {
            return Err(CoreError::ShapeMismatch {
                expected: vec![total],
                actual: vec![values.len()],
            });
        }
        let data = Tensor::from_data(
            TensorData::new(values, shape).convert::<B::FloatElem>(),
            device,
        );
        Ok(Self::new(data, spacing))
    }

    /// Rebuild an image from a flattened `[N, 1]` column.
    pub fn from_column(column: Tensor<B, 2>, shape: [usize; D], spacing: Spacing<D>) -> Self {
        Self::new(column.reshape(shape), spacing)
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Consume the image and return its data tensor.
    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    /// Get the spacing (physical distance between voxels).
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        grid::num_voxels(&self.shape())
    }

    /// Device holding the image data.
    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Samples flattened into a `[N, 1]` column in row-major order.
    pub fn to_column(&self) -> Tensor<B, 2> {
        self.data.clone().reshape([self.num_voxels(), 1])
    }

    /// Samples copied to the host in row-major order.
    pub fn to_values(&self) -> Vec<f64> {
        self.data.clone().into_data().iter::<f64>().collect()
    }

    /// Reject empty axes and invalid spacings.
    pub fn validate(&self) -> Result<()> {
        if let Some(axis) = self.shape().iter().position(|&n| n == 0) {
            return Err(CoreError::EmptyGrid {
                axis,
                length: 0,
                factor: 1.0,
            });
        }
        self.spacing.validate()
    }

    /// Grid of voxel indices, `[N, D]`.
    pub fn index_grid(&self) -> Tensor<B, 2> {
        grid::generate_grid(&self.shape(), &self.device())
    }

    /// Grid of centered physical coordinates, `[N, D]`.
    pub fn physical_grid(&self) -> Tensor<B, 2> {
        grid::generate_physical_grid(&self.shape(), &self.spacing.to_vec(), &self.device())
    }

    /// Convert `[N, D]` physical points to continuous indices of this image.
    pub fn physical_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        grid::physical_to_index(points, &self.shape(), &self.spacing.to_vec())
    }

    /// Convert `[N, D]` continuous indices of this image to physical points.
    pub fn index_to_physical_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        grid::index_to_physical(indices, &self.shape(), &self.spacing.to_vec())
    }

    /// Mean and population standard deviation of the samples.
    pub fn mean_std(&self) -> (f64, f64) {
        let values = self.to_values();
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        (mean, var.sqrt())
    }
}
