use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::downsample::DownsampleFilter;
use crate::error::{CoreError, Result};
use crate::image::Image;

/// Downsampling factor of one pyramid level.
///
/// A factor is either one scalar applied to every axis or an explicit
/// per-axis vector whose length must match the image rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiscaleFactor {
    Uniform(f64),
    PerAxis(Vec<f64>),
}

impl MultiscaleFactor {
    /// Expand to one factor per axis.
    pub fn per_axis(&self, rank: usize) -> Result<Vec<f64>> {
        let factors = match self {
            Self::Uniform(factor) => vec![*factor; rank],
            Self::PerAxis(factors) if factors.len() == rank => factors.clone(),
            Self::PerAxis(factors) => {
                return Err(CoreError::ShapeMismatch {
                    expected: vec![rank],
                    actual: vec![factors.len()],
                })
            }
        };
        for (axis, &factor) in factors.iter().enumerate() {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(CoreError::InvalidFactor { axis, factor });
            }
        }
        Ok(factors)
    }

    /// True when every axis keeps its resolution.
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Uniform(factor) => *factor == 1.0,
            Self::PerAxis(factors) => factors.iter().all(|&f| f == 1.0),
        }
    }
}

impl Default for MultiscaleFactor {
    fn default() -> Self {
        Self::Uniform(1.0)
    }
}

impl From<f64> for MultiscaleFactor {
    fn from(factor: f64) -> Self {
        Self::Uniform(factor)
    }
}

impl From<u32> for MultiscaleFactor {
    fn from(factor: u32) -> Self {
        Self::Uniform(factor as f64)
    }
}

impl From<Vec<f64>> for MultiscaleFactor {
    fn from(factors: Vec<f64>) -> Self {
        Self::PerAxis(factors)
    }
}

impl<const N: usize> From<[f64; N]> for MultiscaleFactor {
    fn from(factors: [f64; N]) -> Self {
        Self::PerAxis(factors.to_vec())
    }
}

impl From<(f64, f64)> for MultiscaleFactor {
    fn from(factors: (f64, f64)) -> Self {
        Self::PerAxis(vec![factors.0, factors.1])
    }
}

impl From<(f64, f64, f64)> for MultiscaleFactor {
    fn from(factors: (f64, f64, f64)) -> Self {
        Self::PerAxis(vec![factors.0, factors.1, factors.2])
    }
}

/// One level of a coarse-to-fine image pyramid.
///
/// Levels are built on demand from the full-resolution image, so only the
/// level currently being registered is held in memory.
#[derive(Debug, Clone)]
pub struct PyramidLevel<B: Backend, const D: usize> {
    image: Image<B, D>,
    factors: Vec<f64>,
}

impl<B: Backend, const D: usize> PyramidLevel<B, D> {
    /// Resize `image` by `factor`.
    ///
    /// A factor of one on every axis returns the image unmodified.
    pub fn build(image: &Image<B, D>, factor: &MultiscaleFactor) -> Result<Self> {
        let factors = factor.per_axis(D)?;
        let image = if factor.is_identity() {
            image.clone()
        } else {
            DownsampleFilter::new(factors.clone()).apply(image)?
        };
        Ok(Self { image, factors })
    }

    pub fn image(&self) -> &Image<B, D> {
        &self.image
    }

    pub fn into_image(self) -> Image<B, D> {
        self.image
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }
}
