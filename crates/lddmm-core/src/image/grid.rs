//! Index and physical coordinate grids.
//!
//! Grids are flattened in row-major order: the last axis varies fastest.
//! Column `k` of a `[N, D]` grid tensor holds the coordinate along axis `k`.
//! Physical coordinates are centered, so index `i` along an axis of length
//! `n` maps to `(i - (n - 1) / 2) * spacing`.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

/// Total number of voxels of a grid.
pub fn num_voxels(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides of a grid.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Index of the central voxel along each axis, `(n - 1) / 2`.
pub fn center_indices(shape: &[usize]) -> Vec<f64> {
    shape.iter().map(|&n| (n as f64 - 1.0) / 2.0).collect()
}

/// Generate the grid of voxel indices for `shape`.
///
/// # Returns
/// Tensor of shape `[N, D]` where `N` is the number of voxels.
pub fn generate_grid<B: Backend>(shape: &[usize], device: &B::Device) -> Tensor<B, 2> {
    let rank = shape.len();
    let total = num_voxels(shape);
    let strides = strides(shape);

    let mut values = Vec::with_capacity(total * rank);
    for flat in 0..total {
        for axis in 0..rank {
            values.push(((flat / strides[axis]) % shape[axis]) as f64);
        }
    }

    Tensor::from_data(
        TensorData::new(values, [total, rank]).convert::<B::FloatElem>(),
        device,
    )
}

/// Generate the grid of centered physical coordinates for `shape`.
pub fn generate_physical_grid<B: Backend>(
    shape: &[usize],
    spacing: &[f64],
    device: &B::Device,
) -> Tensor<B, 2> {
    index_to_physical(generate_grid::<B>(shape, device), shape, spacing)
}

/// Convert `[N, D]` continuous indices into centered physical coordinates.
pub fn index_to_physical<B: Backend>(
    indices: Tensor<B, 2>,
    shape: &[usize],
    spacing: &[f64],
) -> Tensor<B, 2> {
    let device = indices.device();
    let center = row_tensor::<B>(&center_indices(shape), &device);
    let spacing = row_tensor::<B>(spacing, &device);
    indices.sub(center).mul(spacing)
}

/// Convert `[N, D]` centered physical coordinates into continuous indices.
pub fn physical_to_index<B: Backend>(
    points: Tensor<B, 2>,
    shape: &[usize],
    spacing: &[f64],
) -> Tensor<B, 2> {
    let device = points.device();
    let center = row_tensor::<B>(&center_indices(shape), &device);
    let spacing = row_tensor::<B>(spacing, &device);
    points.div(spacing).add(center)
}

/// A `[1, len]` tensor used to broadcast per-axis constants over rows.
pub fn row_tensor<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(values.to_vec(), [1, values.len()]).convert::<B::FloatElem>(),
        device,
    )
}
