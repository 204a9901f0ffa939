//! Gradient clipping for velocity field updates.
//!
//! Dense fields are clipped per voxel on the backend.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Gradient clipping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GradientClipping {
    /// No gradient clipping
    #[default]
    None,
    /// Clip each row (one vector per voxel) by its Euclidean norm
    MaxVectorNorm(f64),
}

impl GradientClipping {
    /// Create a new per-vector norm clipper.
    pub fn max_vector_norm(max_norm: f64) -> Self {
        Self::MaxVectorNorm(max_norm)
    }

    /// Apply gradient clipping to a `[N, C]` field.
    pub fn clip_field<B: Backend>(&self, field: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Self::None => field,
            Self::MaxVectorNorm(max_norm) => {
                let norms = field.clone().powf_scalar(2.0).sum_dim(1).sqrt();
                // Rows at or below the bound get a scale of exactly one.
                let scale = norms.ones_like().mul_scalar(*max_norm) / norms.clamp_min(*max_norm);
                field * scale
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

    #[test]
    fn test_max_vector_norm_field() {
        let device = Default::default();
        let field = Tensor::<B, 2>::from_data(
            TensorData::new(vec![3.0, 4.0, 0.3, 0.4, 0.0, 0.0], [3, 2]).convert::<f32>(),
            &device,
        );
        let clipped: Vec<f64> = GradientClipping::max_vector_norm(1.0)
            .clip_field(field)
            .into_data()
            .iter::<f64>()
            .collect();
        assert!((clipped[0] - 0.6).abs() < 1e-6);
        assert!((clipped[1] - 0.8).abs() < 1e-6);
        assert!((clipped[2] - 0.3).abs() < 1e-7);
        assert!((clipped[3] - 0.4).abs() < 1e-7);
        assert_eq!(&clipped[4..], &[0.0, 0.0]);
    }

    #[test]
    fn test_none_passes_field_through() {
        let device = Default::default();
        let field = Tensor::<B, 2>::ones([2, 3], &device).mul_scalar(7.0);
        let clipped: Vec<f64> = GradientClipping::None.clip_field(field).into_data().iter::<f64>().collect();
        assert!(clipped.iter().all(|&x| x == 7.0));
    }
}
