use burn::tensor::backend::Backend;

use super::separable::{apply_along_axis, area_operator, with_axis_length};
use crate::error::{CoreError, Result};
use crate::image::Image;

/// Downsample filter.
///
/// Resizes the image by real-valued factors using area averaging along each
/// axis. The new length of an axis is `round(n / factor)` and the spacing is
/// multiplied by the factor.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<f64>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    /// Create a new downsample filter.
    ///
    /// # Arguments
    /// * `factors` - Downsampling factor for each dimension, or a single factor for all.
    pub fn new(factors: Vec<f64>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    fn factor(&self, axis: usize) -> f64 {
        self.factors
            .get(axis)
            .or_else(|| self.factors.first())
            .copied()
            .unwrap_or(1.0)
    }

    /// Validated per-axis factors for a grid of rank `rank`.
    pub fn factors_for_rank(&self, rank: usize) -> Result<Vec<f64>> {
        if self.factors.len() > 1 && self.factors.len() != rank {
            return Err(CoreError::ShapeMismatch {
                expected: vec![rank],
                actual: vec![self.factors.len()],
            });
        }
        (0..rank)
            .map(|axis| {
                let factor = self.factor(axis);
                if !factor.is_finite() || factor <= 0.0 {
                    Err(CoreError::InvalidFactor { axis, factor })
                } else {
                    Ok(factor)
                }
            })
            .collect()
    }

    /// Output grid shape for an input grid shape.
    pub fn output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let factors = self.factors_for_rank(shape.len())?;
        shape
            .iter()
            .zip(factors)
            .enumerate()
            .map(|(axis, (&length, factor))| {
                let resized = (length as f64 / factor).round();
                if resized < 1.0 {
                    Err(CoreError::EmptyGrid { axis, length, factor })
                } else {
                    Ok(resized as usize)
                }
            })
            .collect()
    }

    /// Apply the filter to an image.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let shape = image.shape();
        let factors = self.factors_for_rank(D)?;
        let output = self.output_shape(&shape)?;

        let mut data = image.to_column();
        let mut current = shape.to_vec();
        let mut new_spacing = *image.spacing();
        for axis in 0..D {
            new_spacing[axis] *= factors[axis];
            if output[axis] == current[axis] {
                continue;
            }
            let operator = area_operator(current[axis], output[axis]);
            data = apply_along_axis(data, &current, axis, &operator);
            current = with_axis_length(&current, axis, output[axis]);
        }

        let mut new_shape = [0usize; D];
        new_shape.copy_from_slice(&current);
        Ok(Image::from_column(data, new_shape, new_spacing))
    }
}
