//! Damped Gauss-Newton estimation of the affine (or rigid) component.
//!
//! The residual `r(x) = c(M(A y(x))) - R(x)` is linearized in the
//! `D * (D + 1)` free entries of `A`. For row `i` and column `j` of `A`
//! the derivative is `c' dM/dz_i (A y) * [y; 1]_j`.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{DMatrix, DVector};

use lddmm_core::transform::AffineTransform;

use crate::error::{RegistrationError, Result};
use crate::validation;

/// Levenberg damping applied to the diagonal of the normal matrix.
pub const DEFAULT_DAMPING: f64 = 1e-2;

/// Ridge added relative to the mean diagonal, keeps the system definite
/// when the image does not constrain every parameter.
const RIDGE: f64 = 1e-6;

/// Affine step estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineEstimator {
    stepsize: f64,
    damping: f64,
}

/// Gauss-Newton direction from one affine matrix.
///
/// The full step is `A - stepsize * delta`; shorter steps along the same
/// direction are taken with [`AffineProposal::at`].
#[derive(Debug, Clone)]
pub struct AffineProposal<const D: usize> {
    base: AffineTransform<D>,
    step: Vec<f64>,
    rigid: bool,
}

impl<const D: usize> AffineProposal<D> {
    /// Matrix after `scale` times the full step, projected onto a rotation
    /// for rigid iterations.
    pub fn at(&self, scale: f64) -> Result<AffineTransform<D>> {
        let mut matrix = self.base.matrix().clone();
        for row in 0..D {
            for col in 0..=D {
                matrix[(row, col)] -= scale * self.step[row * (D + 1) + col];
            }
        }
        let updated = AffineTransform::<D>::from_matrix(matrix)?;
        if self.rigid {
            project_rigid(&updated)
        } else {
            Ok(updated)
        }
    }

    /// Euclidean norm of the full parameter step.
    pub fn step_norm(&self) -> f64 {
        self.step.iter().map(|s| s * s).sum::<f64>().sqrt()
    }
}

impl AffineEstimator {
    pub fn new(stepsize: f64) -> Self {
        Self {
            stepsize,
            damping: DEFAULT_DAMPING,
        }
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn stepsize(&self) -> f64 {
        self.stepsize
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Descent direction from `affine`.
    ///
    /// # Arguments
    /// * `affine` - Current matrix
    /// * `points` - Physical points `y` before the affine, `[N, D]`
    /// * `residual` - `c(M(A y)) - R`, `[N, 1]`
    /// * `moving_gradient` - `c' * grad M` sampled at `A y`, `[N, D]`
    /// * `rigid` - Project the linear part onto a rotation after the step
    ///
    /// # Returns
    /// `None` when there is nothing to correct.
    pub fn propose<B: Backend, const D: usize>(
        &self,
        affine: &AffineTransform<D>,
        points: Tensor<B, 2>,
        residual: Tensor<B, 2>,
        moving_gradient: Tensor<B, 2>,
        rigid: bool,
    ) -> Result<Option<AffineProposal<D>>> {
        if self.stepsize == 0.0 || validation::is_all_zero(&residual) {
            return Ok(None);
        }
        let [count, _] = points.dims();
        let params = D * (D + 1);

        let ones = Tensor::ones([count, 1], &points.device());
        let homogeneous = Tensor::cat(vec![points, ones], 1);
        let jacobian = (moving_gradient.reshape([count, D, 1]) * homogeneous.reshape([count, 1, D + 1]))
            .reshape([count, params]);
        let jacobian_t = jacobian.clone().transpose();
        let normal = to_matrix(jacobian_t.clone().matmul(jacobian), params, params);
        let gradient = to_matrix(jacobian_t.matmul(residual), params, 1).column(0).into_owned();

        if gradient.iter().all(|g| *g == 0.0) {
            return Ok(None);
        }

        let delta = match self.solve(&normal, &gradient) {
            Some(delta) => delta,
            None => {
                tracing::warn!("Affine normal matrix is singular, skipping step");
                return Ok(None);
            }
        };
        let step: Vec<f64> = (delta * self.stepsize).iter().copied().collect();
        if step.iter().any(|s| !s.is_finite()) {
            return Err(RegistrationError::numerical_instability(
                "affine step is not finite",
            ));
        }
        Ok(Some(AffineProposal {
            base: affine.clone(),
            step,
            rigid,
        }))
    }

    fn solve(&self, normal: &DMatrix<f64>, gradient: &DVector<f64>) -> Option<DVector<f64>> {
        let n = normal.nrows();
        let ridge = RIDGE * normal.trace() / n as f64 + f64::MIN_POSITIVE;
        let mut system = normal.clone();
        for i in 0..n {
            system[(i, i)] += self.damping * normal[(i, i)] + ridge;
        }
        match system.clone().cholesky() {
            Some(cholesky) => Some(cholesky.solve(gradient)),
            None => system.lu().solve(gradient),
        }
    }
}

/// Replace the linear part of `affine` by its nearest rotation.
pub fn project_rigid<const D: usize>(affine: &AffineTransform<D>) -> Result<AffineTransform<D>> {
    let svd = affine.linear().svd(true, true);
    let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(RegistrationError::numerical_instability(
            "SVD of the linear part failed",
        ));
    };
    if (&u * &v_t).determinant() < 0.0 {
        let mut last = u.column_mut(D - 1);
        last.neg_mut();
    }
    let rotation = u * v_t;
    Ok(AffineTransform::from_parts(&rotation, &affine.translation())?)
}

fn to_matrix<B: Backend>(tensor: Tensor<B, 2>, rows: usize, cols: usize) -> DMatrix<f64> {
    let values: Vec<f64> = tensor.into_data().iter::<f64>().collect();
    DMatrix::from_row_slice(rows, cols, &values)
}
