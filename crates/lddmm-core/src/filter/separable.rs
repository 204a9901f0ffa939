//! Separable per-axis linear filters.
//!
//! A separable filter acts along one axis of a flattened `[N, C]` field
//! while leaving every other axis and channel untouched. Gaussian smoothing
//! is a truncated 1D convolution, finite differences are line slices and
//! area downsampling is a small rectangular `m x n` matrix.

use burn::tensor::backend::Backend;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Tensor, TensorData};
use nalgebra::DMatrix;

/// Lines of a `[N, C]` field along `axis`, `[before * after, shape[axis]]`.
struct Lines<B: Backend> {
    data: Tensor<B, 2>,
    before: usize,
    post: usize,
    channels: usize,
}

impl<B: Backend> Lines<B> {
    fn split(field: Tensor<B, 2>, shape: &[usize], axis: usize) -> Self {
        let [_, channels] = field.dims();
        let before: usize = shape[..axis].iter().product();
        let post: usize = shape[axis + 1..].iter().product();
        let length = shape[axis];
        let after = post * channels;
        let data = field
            .reshape([before, length, after])
            .swap_dims(1, 2)
            .reshape([before * after, length]);
        Self {
            data,
            before,
            post,
            channels,
        }
    }

    fn count(&self) -> usize {
        self.before * self.post * self.channels
    }

    /// Put lines of a possibly different length back into `[N', C]`.
    fn merge(self, data: Tensor<B, 2>) -> Tensor<B, 2> {
        let [_, length] = data.dims();
        data.reshape([self.before, self.post * self.channels, length])
            .swap_dims(1, 2)
            .reshape([self.before * length * self.post, self.channels])
    }
}

/// Apply `operator` (`m x n`) along `axis` of a `[N, C]` field with grid `shape`.
///
/// `shape[axis]` must equal the operator's column count. The returned field
/// lives on the same grid with `shape[axis]` replaced by the row count.
pub fn apply_along_axis<B: Backend>(
    field: Tensor<B, 2>,
    shape: &[usize],
    axis: usize,
    operator: &DMatrix<f64>,
) -> Tensor<B, 2> {
    let device = field.device();
    let (rows, cols) = operator.shape();
    debug_assert_eq!(cols, shape[axis]);

    // Transposed operator laid out row-major, `[n, m]`.
    let mut transposed = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        for i in 0..rows {
            transposed.push(operator[(i, j)]);
        }
    }
    let transposed = Tensor::<B, 2>::from_data(
        TensorData::new(transposed, [cols, rows]).convert::<B::FloatElem>(),
        &device,
    );

    let lines = Lines::split(field, shape, axis);
    let mapped = lines.data.clone().matmul(transposed);
    lines.merge(mapped)
}

/// Convolve every line along `axis` with an odd-length `kernel`.
///
/// The kernel is renormalised where it overhangs either end of a line, so
/// each output is a weighted mean of the samples it covers.
pub fn smooth_along_axis<B: Backend>(
    field: Tensor<B, 2>,
    shape: &[usize],
    axis: usize,
    kernel: &[f64],
) -> Tensor<B, 2> {
    let device = field.device();
    let length = shape[axis];
    let width = kernel.len();
    debug_assert_eq!(width % 2, 1);
    let radius = width / 2;

    let lines = Lines::split(field, shape, axis);
    let count = lines.count();
    let weights = Tensor::<B, 3>::from_data(
        TensorData::new(kernel.to_vec(), [1, 1, width]).convert::<B::FloatElem>(),
        &device,
    );
    let options = ConvOptions::new([1], [radius], [1], 1);

    let smoothed = conv1d(
        lines.data.clone().reshape([count, 1, length]),
        weights.clone(),
        None,
        options.clone(),
    );
    let coverage = conv1d(Tensor::<B, 3>::ones([1, 1, length], &device), weights, None, options);
    let smoothed = (smoothed / coverage).reshape([count, length]);
    lines.merge(smoothed)
}

/// First derivative along `axis` in physical units.
///
/// Central differences inside, one-sided differences at both ends and zero
/// for a single sample.
pub fn difference_along_axis<B: Backend>(
    field: Tensor<B, 2>,
    shape: &[usize],
    axis: usize,
    spacing: f64,
) -> Tensor<B, 2> {
    let length = shape[axis];
    if length < 2 {
        return field.zeros_like();
    }
    let lines = Lines::split(field, shape, axis);
    let count = lines.count();
    let data = lines.data.clone();

    let first = (data.clone().slice([0..count, 1..2]) - data.clone().slice([0..count, 0..1])).div_scalar(spacing);
    let last = (data.clone().slice([0..count, length - 1..length])
        - data.clone().slice([0..count, length - 2..length - 1]))
    .div_scalar(spacing);
    let mut parts = vec![first];
    if length > 2 {
        let central = data.clone().slice([0..count, 2..length]) - data.slice([0..count, 0..length - 2]);
        parts.push(central.mul_scalar(0.5 / spacing));
    }
    parts.push(last);
    lines.merge(Tensor::cat(parts, 1))
}

/// Shape after replacing the length of `axis`.
pub fn with_axis_length(shape: &[usize], axis: usize, length: usize) -> Vec<usize> {
    let mut shape = shape.to_vec();
    shape[axis] = length;
    shape
}

/// Gaussian kernel of standard deviation `sigma` voxels, summing to one.
///
/// Cut at three standard deviations and at `max_radius` samples.
pub fn gaussian_kernel(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = ((3.0 * sigma).ceil() as usize).min(max_radius);
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

/// Area-averaging matrix resizing `input` samples into `output` samples.
///
/// Each output sample covers an equal share of the input extent and takes
/// the overlap-weighted mean of the input samples below it.
pub fn area_operator(input: usize, output: usize) -> DMatrix<f64> {
    let ratio = input as f64 / output as f64;
    let mut operator = DMatrix::zeros(output, input);
    for j in 0..output {
        let start = j as f64 * ratio;
        let end = (j + 1) as f64 * ratio;
        let first = start.floor() as usize;
        let last = (end.ceil() as usize).min(input);
        for i in first..last {
            let overlap = (end.min((i + 1) as f64) - start.max(i as f64)).max(0.0);
            operator[(j, i)] = overlap / ratio;
        }
    }
    operator
}
