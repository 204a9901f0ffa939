//! Multilinear interpolation for grids of any rank.
//!
//! Values are blended from the `2^D` corners of the cell containing each
//! coordinate. Corners are gathered from the flattened data with row-major
//! strides.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use super::trait_::{BoundaryMode, Interpolator};
use crate::image::grid;

/// Linear Interpolator.
///
/// Performs multilinear interpolation (bilinear for 2D, trilinear for 3D and
/// so on). Sampling exactly on a grid node returns the stored sample.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator {
    boundary: BoundaryMode,
}

/// Lower corner index and weight of one axis.
struct AxisCell<B: Backend> {
    lower: Tensor<B, 1, Int>,
    upper: Tensor<B, 1, Int>,
    weight: Tensor<B, 1>,
}

impl LinearInterpolator {
    /// Create a new linear interpolator clamping to the edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the out-of-grid policy.
    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn boundary(&self) -> BoundaryMode {
        self.boundary
    }

    fn axis_cell<B: Backend>(coords: Tensor<B, 1>, length: usize) -> AxisCell<B> {
        let count = coords.dims()[0];
        let device = coords.device();
        if length < 2 {
            let lower = Tensor::<B, 1, Int>::zeros([count], &device);
            return AxisCell {
                upper: lower.clone(),
                lower,
                weight: Tensor::zeros([count], &device),
            };
        }

        let clamped = coords.clamp(0.0, (length - 1) as f64);
        // The last node is reached from the cell below it so that it keeps
        // an exact weight of one.
        let lower = clamped.clone().floor().clamp(0.0, (length - 2) as f64);
        let weight = clamped - lower.clone();
        let lower = lower.int();
        AxisCell {
            upper: lower.clone().add_scalar(1),
            lower,
            weight,
        }
    }

    fn inside_mask<B: Backend>(indices: &Tensor<B, 2>, shape: &[usize]) -> Tensor<B, 1> {
        let [count, _] = indices.dims();
        let mut mask = Tensor::<B, 1>::ones([count], &indices.device());
        for (axis, &length) in shape.iter().enumerate() {
            let coords = indices.clone().slice([0..count, axis..axis + 1]).reshape([count]);
            let upper = length.saturating_sub(1) as f64;
            let inside = coords.clone().greater_equal_elem(0.0).float()
                * coords.lower_equal_elem(upper).float();
            mask = mask * inside;
        }
        mask
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate_field(
        &self,
        field: &Tensor<B, 2>,
        shape: &[usize],
        indices: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let rank = shape.len();
        let [count, _] = indices.dims();
        let [_, channels] = field.dims();
        let device = indices.device();
        let strides = grid::strides(shape);

        let cells: Vec<AxisCell<B>> = (0..rank)
            .map(|axis| {
                let coords = indices.clone().slice([0..count, axis..axis + 1]).reshape([count]);
                Self::axis_cell(coords, shape[axis])
            })
            .collect();

        let mut result = Tensor::<B, 2>::zeros([count, channels], &device);
        for corner in 0..(1usize << rank) {
            let mut flat = Tensor::<B, 1, Int>::zeros([count], &device);
            let mut weight = Tensor::<B, 1>::ones([count], &device);
            for (axis, cell) in cells.iter().enumerate() {
                let stride = strides[axis] as i64;
                if corner & (1 << axis) != 0 {
                    flat = flat + cell.upper.clone().mul_scalar(stride);
                    weight = weight * cell.weight.clone();
                } else {
                    flat = flat + cell.lower.clone().mul_scalar(stride);
                    weight = weight * cell.weight.clone().neg().add_scalar(1.0);
                }
            }
            let values = field.clone().select(0, flat);
            result = result + values * weight.reshape([count, 1]);
        }

        match self.boundary {
            BoundaryMode::Nearest => result,
            BoundaryMode::Constant(value) => {
                let inside = Self::inside_mask(&indices, shape).reshape([count, 1]);
                let outside = inside.clone().neg().add_scalar(1.0);
                if value == 0.0 {
                    result * inside
                } else {
                    result * inside + outside.mul_scalar(value)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn tensor2(values: Vec<f64>, shape: [usize; 2]) -> Tensor<B, 2> {
        Tensor::from_data(TensorData::new(values, shape).convert::<f32>(), &Default::default())
    }

    fn host(t: Tensor<B, 2>) -> Vec<f64> {
        t.into_data().iter::<f64>().collect()
    }

    #[test]
    fn test_grid_nodes_are_exact() {
        let device = Default::default();
        let shape = [3, 4];
        let values: Vec<f64> = (0..12).map(|v| (v * v) as f64).collect();
        let field = tensor2(values.clone(), [12, 1]);
        let indices = grid::generate_grid::<B>(&shape, &device);
        let sampled = LinearInterpolator::new().interpolate_field(&field, &shape, indices);
        assert_eq!(host(sampled), values);
    }

    #[test]
    fn test_midpoint_average_2d() {
        let field = tensor2(vec![0.0, 1.0, 2.0, 3.0], [4, 1]);
        let indices = tensor2(vec![0.5, 0.5, 0.0, 0.5, 1.0, 0.25], [3, 2]);
        let sampled = host(LinearInterpolator::new().interpolate_field(&field, &[2, 2], indices));
        assert!((sampled[0] - 1.5).abs() < 1e-6);
        assert!((sampled[1] - 0.5).abs() < 1e-6);
        assert!((sampled[2] - 2.25).abs() < 1e-6);
    }

    #[test]
    fn test_multichannel_field() {
        let field = tensor2(vec![0.0, 10.0, 2.0, 20.0], [2, 2]);
        let indices = tensor2(vec![0.5], [1, 1]);
        let sampled = host(LinearInterpolator::new().interpolate_field(&field, &[2], indices));
        assert!((sampled[0] - 1.0).abs() < 1e-6);
        assert!((sampled[1] - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_boundary_modes() {
        let field = tensor2(vec![1.0, 2.0, 3.0], [3, 1]);
        let indices = tensor2(vec![-1.0, 5.0, 1.0], [3, 1]);

        let nearest = host(LinearInterpolator::new().interpolate_field(&field, &[3], indices.clone()));
        assert_eq!(nearest, vec![1.0, 3.0, 2.0]);

        let constant = host(
            LinearInterpolator::new()
                .with_boundary(BoundaryMode::Constant(-7.0))
                .interpolate_field(&field, &[3], indices),
        );
        assert_eq!(constant, vec![-7.0, -7.0, 2.0]);
    }

    #[test]
    fn test_singleton_axis() {
        let field = tensor2(vec![4.0, 5.0], [2, 1]);
        let indices = tensor2(vec![0.3, 1.0, 0.0, 0.0], [2, 2]);
        let sampled = host(LinearInterpolator::new().interpolate_field(&field, &[1, 2], indices));
        assert_eq!(sampled, vec![5.0, 4.0]);
    }

    #[test]
    fn test_scalar_volume_interpolate() {
        let device = Default::default();
        let data = Tensor::<B, 3>::ones([2, 2, 2], &device).mul_scalar(3.0);
        let indices = tensor2(vec![0.5, 0.5, 0.5], [1, 3]);
        let sampled: Vec<f64> = LinearInterpolator::new()
            .interpolate(&data, indices)
            .into_data()
            .iter::<f64>()
            .collect();
        assert!((sampled[0] - 3.0).abs() < 1e-6);
    }
}
