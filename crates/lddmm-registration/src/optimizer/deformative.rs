//! Gradient descent on the time-varying velocity fields.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use lddmm_core::filter::gradient::spatial_gradient;
use lddmm_core::image::Image;
use lddmm_core::interpolation::{Interpolator, LinearInterpolator};
use lddmm_core::transform::AffineTransform;

use super::gradient_clipping::GradientClipping;
use crate::integrator::DiffeomorphicFlow;
use crate::metric::ContrastMap;
use crate::regularization::Regularizer;
use crate::velocity::VelocityFields;

/// Lifecycle of a [`DeformativeOptimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    /// No step taken yet.
    Uninitialized,
    /// At least one step taken and the step budget is not used up.
    Iterating,
    /// Every allowed step has been taken; no further increments are produced.
    Exhausted,
}

/// Images and intensity model the velocity gradient is computed against.
pub struct MatchingContext<'a, B: Backend, const D: usize> {
    /// Reference image; its grid is the velocity grid.
    pub reference: &'a Image<B, D>,
    pub moving: &'a Image<B, D>,
    /// Affine applied after the inverse flow.
    pub affine: &'a AffineTransform<D>,
    pub contrast: ContrastMap,
    pub sigma_matching: f64,
}

/// Deformative optimizer.
///
/// Per step and time index `t`:
/// `v_t += eps * (K g_t - v_t / sigma_R^2)`, the increment clipped per voxel,
/// where `g_t = sigma_M^-2 |D phi_{t,1}| (c(J0_t) - J1_t) c' grad J0_t`.
pub struct DeformativeOptimizer<B: Backend, const D: usize> {
    velocities: VelocityFields<B, D>,
    regularizer: Box<dyn Regularizer<B>>,
    stepsize: f64,
    sigma_regularization: Option<f64>,
    clipping: GradientClipping,
    interpolator: LinearInterpolator,
    state: OptimizerState,
    steps_taken: usize,
    max_steps: Option<usize>,
}

impl<B: Backend, const D: usize> DeformativeOptimizer<B, D> {
    pub fn new(velocities: VelocityFields<B, D>, regularizer: Box<dyn Regularizer<B>>, stepsize: f64) -> Self {
        Self {
            velocities,
            regularizer,
            stepsize,
            sigma_regularization: None,
            clipping: GradientClipping::None,
            interpolator: LinearInterpolator::new(),
            state: OptimizerState::Uninitialized,
            steps_taken: 0,
            max_steps: None,
        }
    }

    /// Penalize velocity magnitude with weight `1 / sigma^2`.
    pub fn with_sigma_regularization(mut self, sigma: Option<f64>) -> Self {
        self.sigma_regularization = sigma;
        self
    }

    /// Bound each per-voxel update.
    pub fn with_clipping(mut self, clipping: GradientClipping) -> Self {
        self.clipping = clipping;
        self
    }

    /// Stop updating after `max_steps` steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        if max_steps == 0 {
            self.state = OptimizerState::Exhausted;
        }
        self
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn velocities(&self) -> &VelocityFields<B, D> {
        &self.velocities
    }

    /// Emit the optimized velocity fields.
    pub fn into_velocity_fields(self) -> VelocityFields<B, D> {
        self.velocities
    }

    /// Clipped update of every time step from the flow of the current velocities.
    ///
    /// Returns `None` when no step is allowed (exhausted or zero step size).
    pub fn increments(
        &self,
        flow: &DiffeomorphicFlow<B, D>,
        context: &MatchingContext<'_, B, D>,
    ) -> Option<Vec<Tensor<B, 2>>> {
        if self.state == OptimizerState::Exhausted || self.stepsize == 0.0 {
            return None;
        }

        let shape = self.velocities.shape();
        let spacing = self.velocities.spacing().to_vec();
        let count: usize = shape.iter().product();
        let inv_sigma2 = 1.0 / (context.sigma_matching * context.sigma_matching);

        let increments = (0..self.velocities.num_timesteps())
            .map(|t| {
                let force = self.matching_force(flow, context, t, &shape, &spacing, count);
                let smoothed = self.regularizer.smooth(force.mul_scalar(inv_sigma2), &shape, &spacing);
                let direction = match self.sigma_regularization {
                    Some(sigma) => smoothed - self.velocities.field(t).clone().div_scalar(sigma * sigma),
                    None => smoothed,
                };
                self.clipping.clip_field(direction.mul_scalar(self.stepsize))
            })
            .collect();
        Some(increments)
    }

    /// Current velocities plus `scale` times `increments`.
    pub fn candidate(&self, increments: &[Tensor<B, 2>], scale: f64) -> VelocityFields<B, D> {
        let mut candidate = self.velocities.clone();
        for (t, increment) in increments.iter().enumerate() {
            candidate.set_field(t, self.velocities.field(t).clone() + increment.clone().mul_scalar(scale));
        }
        candidate
    }

    /// Replace the velocities by an accepted candidate and count the step.
    pub fn accept(&mut self, velocities: VelocityFields<B, D>) {
        self.velocities = velocities;
        self.steps_taken += 1;
        self.state = match self.max_steps {
            Some(max) if self.steps_taken >= max => OptimizerState::Exhausted,
            _ => OptimizerState::Iterating,
        };
    }

    /// `|D phi_{t,1}| (c(J0_t) - J1_t) c' grad J0_t` as `[N, D]`.
    fn matching_force(
        &self,
        flow: &DiffeomorphicFlow<B, D>,
        context: &MatchingContext<'_, B, D>,
        t: usize,
        shape: &[usize; D],
        spacing: &[f64],
        count: usize,
    ) -> Tensor<B, 2> {
        // J0_t: moving image pulled back through A and phi_{t,0}.
        let moving = context.moving;
        let indices = flow
            .to_start(t)
            .indices_through(context.affine, &moving.shape(), moving.spacing());
        let template = self
            .interpolator
            .interpolate(moving.data(), indices)
            .reshape([count, 1]);
        let template_gradient =
            spatial_gradient(template.clone(), shape, spacing).mul_scalar(context.contrast.scale);

        // J1_t: reference pushed through phi_{t,1}.
        let reference = context.reference;
        let end = flow.to_end(t);
        let indices = end.indices_through(&AffineTransform::identity(), &reference.shape(), reference.spacing());
        let target = self
            .interpolator
            .interpolate(reference.data(), indices)
            .reshape([count, 1]);

        let weight = (context.contrast.apply(template) - target) * end.jacobian_determinant();
        template_gradient * weight
    }
}
