//! Sum of squared differences with an optional intensity model.
//!
//! `E = 1/(2 sigma^2) * sum_x (c(M(T(x))) - R(x))^2 * voxel_volume`, where
//! `c` is the contrast map fitted for the current alignment.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use lddmm_core::image::Image;

use crate::config::ContrastModel;

/// Intensity map `a + b * m` applied to moving intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastMap {
    pub offset: f64,
    pub scale: f64,
}

impl Default for ContrastMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl ContrastMap {
    pub fn identity() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
        }
    }

    /// Least-squares fit of `target ~ a + b * source`.
    ///
    /// A constant source keeps unit scale and only matches the means.
    pub fn fit(source: &[f64], target: &[f64]) -> Self {
        let n = source.len().min(target.len()).max(1) as f64;
        let source_mean = source.iter().sum::<f64>() / n;
        let target_mean = target.iter().sum::<f64>() / n;
        let mut covariance = 0.0;
        let mut variance = 0.0;
        for (s, t) in source.iter().zip(target) {
            covariance += (s - source_mean) * (t - target_mean);
            variance += (s - source_mean) * (s - source_mean);
        }
        if variance <= f64::EPSILON * n {
            return Self {
                offset: target_mean - source_mean,
                scale: 1.0,
            };
        }
        let scale = covariance / variance;
        Self {
            offset: target_mean - scale * source_mean,
            scale,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }

    pub fn apply<B: Backend, const D: usize>(&self, values: Tensor<B, D>) -> Tensor<B, D> {
        if self.is_identity() {
            values
        } else {
            values.mul_scalar(self.scale).add_scalar(self.offset)
        }
    }
}

/// Residual and energy of one alignment.
#[derive(Debug, Clone)]
pub struct MatchingTerms<B: Backend> {
    /// Moving intensities at the mapped points before the contrast map, `[N, 1]`.
    pub deformed: Tensor<B, 2>,
    /// `c(deformed) - reference`, `[N, 1]`.
    pub residual: Tensor<B, 2>,
    pub contrast: ContrastMap,
    pub energy: f64,
}

/// Mean Squared Error Metric, scaled as a matching energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanSquaredError {
    sigma: f64,
    contrast_model: ContrastModel,
}

impl MeanSquaredError {
    /// Create a new metric with noise level `sigma`.
    pub fn new(sigma: f64, contrast_model: ContrastModel) -> Self {
        Self {
            sigma,
            contrast_model,
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Energy of a `[N, 1]` residual on a grid with `voxel_volume`.
    pub fn energy_of<B: Backend>(&self, residual: &Tensor<B, 2>, voxel_volume: f64) -> f64 {
        let sum_sq = residual.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        0.5 * sum_sq * voxel_volume / (self.sigma * self.sigma)
    }

    /// Compare already-deformed moving intensities `[N, 1]` with the fixed image.
    pub fn evaluate_deformed<B: Backend, const D: usize>(
        &self,
        fixed: &Image<B, D>,
        deformed: Tensor<B, 2>,
    ) -> MatchingTerms<B> {
        let reference = fixed.to_column();
        let contrast = match self.contrast_model {
            ContrastModel::Identity => ContrastMap::identity(),
            ContrastModel::Linear => {
                let source: Vec<f64> = deformed.clone().into_data().iter::<f64>().collect();
                ContrastMap::fit(&source, &fixed.to_values())
            }
        };
        let residual = contrast.apply(deformed.clone()) - reference;
        let voxel_volume: f64 = (0..D).map(|axis| fixed.spacing()[axis]).product();
        let energy = self.energy_of(&residual, voxel_volume);
        MatchingTerms {
            deformed,
            residual,
            contrast,
            energy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use lddmm_core::spatial::Spacing2;

    type B = NdArray<f32>;

    #[test]
    fn test_contrast_fit_recovers_line() {
        let source = [0.0, 1.0, 2.0, 3.0];
        let target: Vec<f64> = source.iter().map(|s| 2.0 + 0.5 * s).collect();
        let map = ContrastMap::fit(&source, &target);
        assert!((map.scale - 0.5).abs() < 1e-12);
        assert!((map.offset - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_contrast_fit_constant_source() {
        let map = ContrastMap::fit(&[1.0, 1.0], &[3.0, 5.0]);
        assert_eq!(map, ContrastMap { offset: 3.0, scale: 1.0 });
    }

    #[test]
    fn test_identical_images_have_zero_energy() {
        let device = Default::default();
        let values: Vec<f64> = (0..20).map(|v| (v % 3) as f64).collect();
        let image = Image::<B, 2>::from_values(values, [4, 5], Spacing2::uniform(1.0), &device).unwrap();
        let metric = MeanSquaredError::new(1.0, ContrastModel::Identity);
        let terms = metric.evaluate_deformed(&image, image.to_column());
        assert_eq!(terms.energy, 0.0);
        assert!(terms.contrast.is_identity());
        assert_eq!(terms.deformed.dims(), [20, 1]);
    }

    #[test]
    fn test_energy_scaling() {
        let device = Default::default();
        let fixed = Image::<B, 2>::new(Tensor::zeros([2, 2], &device), Spacing2::new([1.0, 2.0]));
        let metric = MeanSquaredError::new(2.0, ContrastModel::Identity);
        let terms = metric.evaluate_deformed(&fixed, Tensor::ones([4, 1], &device));
        // 0.5 * 4 voxels * volume 2 / sigma^2 4
        assert!((terms.energy - 1.0).abs() < 1e-12);
        assert!((metric.energy_of(&terms.residual, 2.0) - terms.energy).abs() < 1e-12);
    }

    #[test]
    fn test_linear_contrast_absorbs_gain() {
        let device = Default::default();
        let values: Vec<f64> = (0..9).map(|v| v as f64).collect();
        let bright: Vec<f64> = values.iter().map(|v| 3.0 * v + 1.0).collect();
        let fixed = Image::<B, 2>::from_values(bright, [3, 3], Spacing2::uniform(1.0), &device).unwrap();
        let moving = Image::<B, 2>::from_values(values, [3, 3], Spacing2::uniform(1.0), &device).unwrap();
        let metric = MeanSquaredError::new(1.0, ContrastModel::Linear);
        let terms = metric.evaluate_deformed(&fixed, moving.to_column());
        assert!(terms.energy < 1e-8);
        assert!((terms.contrast.scale - 3.0).abs() < 1e-6);
    }
}
