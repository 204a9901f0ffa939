//! Coordinate maps in the `map_coordinates` convention.
//!
//! A coordinate map lives on a target grid and stores, for each target
//! voxel, the continuous index into a source image to read from. Warping a
//! source image through the map resamples it onto the target grid.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{CoreError, Result};
use crate::filter::resample::map_coordinates;
use crate::image::{grid, Image};
use crate::interpolation::{BoundaryMode, LinearInterpolator};
use crate::spatial::Spacing;

/// Per-voxel source indices on a target grid.
#[derive(Debug, Clone)]
pub struct CoordinateMap<B: Backend, const D: usize> {
    shape: [usize; D],
    spacing: Spacing<D>,
    /// Source indices `[N, D]`, row-major over the target grid.
    coordinates: Tensor<B, 2>,
}

impl<B: Backend, const D: usize> CoordinateMap<B, D> {
    pub fn new(shape: [usize; D], spacing: Spacing<D>, coordinates: Tensor<B, 2>) -> Result<Self> {
        let expected = [grid::num_voxels(&shape), D];
        let actual = coordinates.dims();
        if actual != expected {
            return Err(CoreError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(Self {
            shape,
            spacing,
            coordinates,
        })
    }

    /// Map sending every voxel to itself.
    pub fn identity(shape: [usize; D], spacing: Spacing<D>, device: &B::Device) -> Self {
        Self {
            coordinates: grid::generate_grid(&shape, device),
            shape,
            spacing,
        }
    }

    /// Shape of the grid the map is defined on.
    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    /// Spacing of the grid the map is defined on.
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Source indices, `[N, D]`.
    pub fn coordinates(&self) -> &Tensor<B, 2> {
        &self.coordinates
    }

    pub fn into_coordinates(self) -> Tensor<B, 2> {
        self.coordinates
    }

    /// Source indices laid out component-first, `[D, N]`.
    pub fn to_component_layout(&self) -> Tensor<B, 2> {
        self.coordinates.clone().transpose()
    }

    pub fn num_points(&self) -> usize {
        grid::num_voxels(&self.shape)
    }

    /// Resample `source` onto the map's grid, clamping at the source edge.
    pub fn warp(&self, source: &Image<B, D>) -> Image<B, D> {
        self.warp_with(source, BoundaryMode::Nearest)
    }

    /// Resample `source` onto the map's grid with an explicit boundary policy.
    pub fn warp_with(&self, source: &Image<B, D>, boundary: BoundaryMode) -> Image<B, D> {
        let interpolator = LinearInterpolator::new().with_boundary(boundary);
        let values = map_coordinates(source, self.coordinates.clone(), &interpolator);
        Image::new(values.reshape(self.shape), self.spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing2;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_identity_warp_reproduces_image() {
        let device = Default::default();
        let values: Vec<f64> = (0..12).map(|v| (v as f64).sin()).collect();
        let image = Image::<B, 2>::from_values(values, [3, 4], Spacing2::uniform(1.0), &device).unwrap();
        let map = CoordinateMap::identity([3, 4], Spacing2::uniform(1.0), &device);
        assert_eq!(map.warp(&image).to_values(), image.to_values());
    }

    #[test]
    fn test_component_layout() {
        let device = Default::default();
        let map = CoordinateMap::<B, 2>::identity([2, 3], Spacing2::uniform(1.0), &device);
        let layout = map.to_component_layout();
        assert_eq!(layout.dims(), [2, 6]);
        let rows: Vec<f64> = layout.into_data().iter::<f64>().collect();
        assert_eq!(&rows[..6], &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(&rows[6..], &[0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_new_checks_shape() {
        let device = Default::default();
        let bad = CoordinateMap::<B, 2>::new([2, 3], Spacing2::uniform(1.0), Tensor::zeros([6, 3], &device));
        assert!(bad.is_err());
    }
}
