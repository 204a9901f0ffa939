//! Dense displacement field transform.
//!
//! Each voxel of a grid stores a physical displacement vector. The map
//! sends a physical point `x` to `x + u(x)`, with `u` interpolated linearly
//! between voxels and clamped to the edge outside the grid.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::affine::AffineTransform;
use super::trait_::Transform;
use crate::error::{CoreError, Result};
use crate::filter::gradient;
use crate::image::grid;
use crate::interpolation::{Interpolator, LinearInterpolator};
use crate::spatial::Spacing;

/// Displacement field sampled on a centered grid.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend, const D: usize> {
    /// Displacements `[N, D]` in physical units, row-major voxel order.
    displacement: Tensor<B, 2>,
    shape: [usize; D],
    spacing: Spacing<D>,
}

impl<B: Backend, const D: usize> DisplacementField<B, D> {
    /// Create a displacement field on the grid `shape` with `spacing`.
    pub fn new(displacement: Tensor<B, 2>, shape: [usize; D], spacing: Spacing<D>) -> Result<Self> {
        let expected = [grid::num_voxels(&shape), D];
        let actual = displacement.dims();
        if actual != expected {
            return Err(CoreError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(Self {
            displacement,
            shape,
            spacing,
        })
    }

    /// The identity map on the grid.
    pub fn zeros(shape: [usize; D], spacing: Spacing<D>, device: &B::Device) -> Self {
        Self {
            displacement: Tensor::zeros([grid::num_voxels(&shape), D], device),
            shape,
            spacing,
        }
    }

    pub fn displacement(&self) -> &Tensor<B, 2> {
        &self.displacement
    }

    pub fn into_displacement(self) -> Tensor<B, 2> {
        self.displacement
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Physical grid points of the field, `[N, D]`.
    pub fn grid_points(&self) -> Tensor<B, 2> {
        grid::generate_physical_grid(&self.shape, &self.spacing.to_vec(), &self.displacement.device())
    }

    /// Mapped position of every grid point, `x + u(x)`.
    pub fn positions(&self) -> Tensor<B, 2> {
        self.grid_points() + self.displacement.clone()
    }

    /// Displacement interpolated at arbitrary physical points `[K, D]`.
    pub fn sample(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let indices = grid::physical_to_index(points, &self.shape, &self.spacing.to_vec());
        self.sample_at_indices(indices)
    }

    /// Displacement interpolated at continuous indices `[K, D]` of the grid.
    pub fn sample_at_indices(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        LinearInterpolator::new().interpolate_field(&self.displacement, &self.shape, indices)
    }

    /// Indices into a target grid of `affine(x + u(x))` for every grid point.
    ///
    /// The affine is applied on voxel indices, so a zero field under the
    /// identity between equal grids gives the exact index grid.
    pub fn indices_through(
        &self,
        affine: &AffineTransform<D>,
        target_shape: &[usize; D],
        target_spacing: &Spacing<D>,
    ) -> Tensor<B, 2> {
        let device = self.displacement.device();
        let to_target = affine.to_index_space(&self.shape, &self.spacing, target_shape, target_spacing);
        let offset = self
            .displacement
            .clone()
            .div(grid::row_tensor::<B>(&self.spacing.to_vec(), &device));
        to_target.transform_points(grid::generate_grid::<B>(&self.shape, &device) + offset)
    }

    /// Jacobian determinant of the map at every grid point, `[N, 1]`.
    pub fn jacobian_determinant(&self) -> Tensor<B, 2> {
        gradient::jacobian_determinant(self.displacement.clone(), &self.shape, &self.spacing.to_vec())
    }

    /// Largest displacement norm over the grid.
    pub fn max_displacement(&self) -> f64 {
        let norms = self.displacement.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        norms
            .into_data()
            .iter::<f64>()
            .fold(0.0, f64::max)
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for DisplacementField<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let displacement = self.sample(points.clone());
        points + displacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing2;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_shape_is_checked() {
        let device = Default::default();
        let result = DisplacementField::<B, 2>::new(Tensor::zeros([5, 2], &device), [2, 3], Spacing2::uniform(1.0));
        assert!(matches!(result, Err(CoreError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_field_is_identity() {
        let device = Default::default();
        let field = DisplacementField::<B, 2>::zeros([4, 3], Spacing2::new([1.0, 2.0]), &device);
        let points = Tensor::<B, 2>::from_floats([[0.25, -7.0], [1.5, 2.0]], &device);
        let mapped: Vec<f64> = field.transform_points(points.clone()).into_data().iter::<f64>().collect();
        let original: Vec<f64> = points.into_data().iter::<f64>().collect();
        assert_eq!(mapped, original);
        assert_eq!(field.max_displacement(), 0.0);
    }

    #[test]
    fn test_indices_through_identity_is_index_grid() {
        let device = Default::default();
        let spacing = Spacing2::new([0.3, 0.7]);
        let field = DisplacementField::<B, 2>::zeros([6, 5], spacing, &device);
        let indices: Vec<f64> = field
            .indices_through(&AffineTransform::identity(), &[6, 5], &spacing)
            .into_data()
            .iter::<f64>()
            .collect();
        let expected: Vec<f64> = grid::generate_grid::<B>(&[6, 5], &device).into_data().iter::<f64>().collect();
        for (got, want) in indices.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_indices_through_shift() {
        let device = Default::default();
        let spacing = Spacing2::new([2.0, 0.5]);
        // One voxel along each axis in physical units.
        let shift = Tensor::<B, 2>::ones([12, 2], &device) * Tensor::<B, 2>::from_floats([[2.0, 0.5]], &device);
        let field = DisplacementField::new(shift, [3, 4], spacing).unwrap();
        let indices: Vec<f64> = field
            .indices_through(&AffineTransform::identity(), &[3, 4], &spacing)
            .into_data()
            .iter::<f64>()
            .collect();
        assert_eq!(&indices[..4], &[1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_constant_shift() {
        let device = Default::default();
        let shift = Tensor::<B, 2>::ones([12, 2], &device).mul_scalar(0.5);
        let field = DisplacementField::new(shift, [3, 4], Spacing2::uniform(1.0)).unwrap();
        let positions: Vec<f64> = field.positions().into_data().iter::<f64>().collect();
        let grid_points: Vec<f64> = field.grid_points().into_data().iter::<f64>().collect();
        for (p, g) in positions.iter().zip(grid_points) {
            assert!((p - g - 0.5).abs() < 1e-6);
        }
        let det: Vec<f64> = field.jacobian_determinant().into_data().iter::<f64>().collect();
        assert!(det.iter().all(|&d| (d - 1.0).abs() < 1e-6));
    }
}
