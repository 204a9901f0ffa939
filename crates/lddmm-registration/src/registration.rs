//! Iteration loop of a single scale level.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use lddmm_core::filter::gradient::spatial_gradient;
use lddmm_core::image::Image;
use lddmm_core::interpolation::{Interpolator, LinearInterpolator};
use lddmm_core::transform::AffineTransform;

use crate::config::RegistrationConfig;
use crate::error::Result;
use crate::integrator::{DiffeomorphicFlow, FlowIntegrator};
use crate::metric::{MatchingTerms, MeanSquaredError};
use crate::optimizer::{AffineEstimator, AffineProposal, DeformativeOptimizer, GradientClipping, MatchingContext};
use crate::progress::{EnergyRecord, ProgressTracker};
use crate::regularization::GaussianRegularizer;
use crate::validation;
use crate::velocity::VelocityFields;

/// Halvings of the combined step tried before an iteration is rejected.
pub const MAX_STEP_HALVINGS: usize = 8;

/// Flow, sampling positions and energy of one `(affine, velocities)` state.
struct Evaluation<B: Backend, const D: usize> {
    flow: DiffeomorphicFlow<B, D>,
    /// `phi_{1,0}(x)` in physical units, `[N, D]`.
    points: Tensor<B, 2>,
    /// Moving-image indices of `A phi_{1,0}(x)`, `[N, D]`.
    indices: Tensor<B, 2>,
    terms: MatchingTerms<B>,
    regularization: f64,
}

impl<B: Backend, const D: usize> Evaluation<B, D> {
    fn total(&self) -> f64 {
        self.terms.energy + self.regularization
    }
}

/// An accepted trial state.
struct Accepted<B: Backend, const D: usize> {
    affine: AffineTransform<D>,
    velocities: Option<VelocityFields<B, D>>,
    evaluation: Evaluation<B, D>,
    scale: f64,
}

/// Registration of one pyramid level.
///
/// Velocity fields live on the reference grid of the level. Every iteration
/// records the energy of the current state, then proposes an affine step
/// and, past the affine-only prefix, a velocity step, both computed from
/// that state. The combined step is halved until the total energy drops;
/// when no halving lowers it the state is kept.
pub struct LevelRegistration<'a, B: Backend, const D: usize> {
    config: &'a RegistrationConfig,
    level: usize,
    reference: Image<B, D>,
    moving: Image<B, D>,
    moving_gradient: Tensor<B, 2>,
    metric: MeanSquaredError,
    integrator: FlowIntegrator<B>,
    interpolator: LinearInterpolator,
}

impl<'a, B: Backend, const D: usize> LevelRegistration<'a, B, D> {
    pub fn new(
        config: &'a RegistrationConfig,
        level: usize,
        reference: Image<B, D>,
        moving: Image<B, D>,
        metric: MeanSquaredError,
    ) -> Self {
        let moving_gradient = spatial_gradient(
            moving.to_column(),
            &moving.shape(),
            &moving.spacing().to_vec(),
        );
        Self {
            config,
            level,
            reference,
            moving,
            moving_gradient,
            metric,
            integrator: FlowIntegrator::new(),
            interpolator: LinearInterpolator::new(),
        }
    }

    pub fn reference(&self) -> &Image<B, D> {
        &self.reference
    }

    pub fn moving(&self) -> &Image<B, D> {
        &self.moving
    }

    /// Smoothing length of the velocity regularizer on this level.
    pub fn smooth_length(&self) -> f64 {
        self.config
            .smooth_length
            .unwrap_or_else(|| 2.0 * self.reference.spacing().max_spacing())
    }

    /// Run `num_iterations` iterations starting from `affine` and `velocities`.
    ///
    /// One [`EnergyRecord`] per iteration is appended to `history`. On a
    /// level the recorded total energy never increases.
    pub fn execute(
        &self,
        affine: AffineTransform<D>,
        velocities: VelocityFields<B, D>,
        tracker: &ProgressTracker,
        history: &mut Vec<EnergyRecord>,
    ) -> Result<(AffineTransform<D>, VelocityFields<B, D>)> {
        let config = self.config;
        let iterations = config.num_iterations;
        let step_clip = config.velocity_step_clip * self.reference.spacing().min_spacing();

        let regularizer = GaussianRegularizer::<B>::new(self.smooth_length());
        let mut deformative = DeformativeOptimizer::new(velocities, Box::new(regularizer), config.deformative_stepsize)
            .with_sigma_regularization(config.sigma_regularization)
            .with_clipping(GradientClipping::max_vector_norm(step_clip))
            .with_max_steps(iterations.saturating_sub(config.num_affine_only_iterations));
        let estimator = AffineEstimator::new(config.affine_stepsize);
        let mut affine = affine;
        let mut current = self.evaluate(&affine, deformative.velocities())?;

        for iteration in 0..iterations {
            let phase = config.phase(iteration);
            let record = EnergyRecord {
                level: self.level,
                iteration,
                phase,
                matching: current.terms.energy,
                regularization: current.regularization,
            };
            validation::check_energy(record.total(), config.check_numerical_stability, || {
                format!(
                    "at level {} iteration {} ({:?})",
                    self.level,
                    iteration,
                    phase
                )
            })?;
            tracing::debug!(
                "Level {} iteration {} ({:?}): matching {:.6}, regularization {:.6}",
                self.level,
                iteration,
                phase,
                record.matching,
                record.regularization
            );
            tracker.update(record, Some(iterations));
            history.push(record);

            let proposal = if config.affine_stepsize > 0.0 {
                let gradient = self
                    .interpolator
                    .interpolate_field(&self.moving_gradient, &self.moving.shape(), current.indices.clone())
                    .mul_scalar(current.terms.contrast.scale);
                estimator.propose(
                    &affine,
                    current.points.clone(),
                    current.terms.residual.clone(),
                    gradient,
                    config.is_rigid(iteration),
                )?
            } else {
                None
            };

            let increments = if config.is_deformative(iteration) {
                let context = MatchingContext {
                    reference: &self.reference,
                    moving: &self.moving,
                    affine: &affine,
                    contrast: current.terms.contrast,
                    sigma_matching: self.metric.sigma(),
                };
                deformative.increments(&current.flow, &context)
            } else {
                None
            };

            if proposal.is_none() && increments.is_none() {
                continue;
            }
            let accepted = self.line_search(
                &affine,
                proposal.as_ref(),
                &deformative,
                increments.as_deref(),
                &current,
            )?;
            match accepted {
                Some(step) => {
                    if step.scale < 1.0 {
                        tracing::trace!(
                            "Level {} iteration {}: step accepted at scale {}",
                            self.level,
                            iteration,
                            step.scale
                        );
                    }
                    affine = step.affine;
                    if let Some(velocities) = step.velocities {
                        deformative.accept(velocities);
                    }
                    current = step.evaluation;
                }
                None => tracing::debug!(
                    "Level {} iteration {}: no step lowered the energy, keeping the current state",
                    self.level,
                    iteration
                ),
            }
        }

        tracing::info!(
            "Level {} done after {} iterations, max velocity {:.4}",
            self.level,
            iterations,
            deformative.velocities().max_magnitude()
        );
        Ok((affine, deformative.into_velocity_fields()))
    }

    /// Shrink the combined step until the total energy falls below `current`.
    fn line_search(
        &self,
        affine: &AffineTransform<D>,
        proposal: Option<&AffineProposal<D>>,
        deformative: &DeformativeOptimizer<B, D>,
        increments: Option<&[Tensor<B, 2>]>,
        current: &Evaluation<B, D>,
    ) -> Result<Option<Accepted<B, D>>> {
        let energy = current.total();
        let mut scale = 1.0;
        for _ in 0..=MAX_STEP_HALVINGS {
            let trial_affine = match proposal {
                Some(proposal) => proposal.at(scale)?,
                None => affine.clone(),
            };
            let trial_velocities = increments.map(|increments| deformative.candidate(increments, scale));
            let evaluation = match &trial_velocities {
                Some(velocities) => self.evaluate(&trial_affine, velocities)?,
                None => self.evaluate_flow(&trial_affine, deformative.velocities(), current.flow.clone()),
            };
            if evaluation.total() < energy {
                return Ok(Some(Accepted {
                    affine: trial_affine,
                    velocities: trial_velocities,
                    evaluation,
                    scale,
                }));
            }
            scale *= 0.5;
        }
        Ok(None)
    }

    fn evaluate(&self, affine: &AffineTransform<D>, velocities: &VelocityFields<B, D>) -> Result<Evaluation<B, D>> {
        let flow = self.integrator.integrate(velocities)?;
        Ok(self.evaluate_flow(affine, velocities, flow))
    }

    /// Energy of `affine` after the flow of `velocities`.
    fn evaluate_flow(
        &self,
        affine: &AffineTransform<D>,
        velocities: &VelocityFields<B, D>,
        flow: DiffeomorphicFlow<B, D>,
    ) -> Evaluation<B, D> {
        let inverse = flow.inverse();
        let points = inverse.positions();
        let indices = inverse.indices_through(affine, &self.moving.shape(), self.moving.spacing());
        let deformed = self
            .interpolator
            .interpolate(self.moving.data(), indices.clone())
            .reshape([self.reference.num_voxels(), 1]);
        let terms = self.metric.evaluate_deformed(&self.reference, deformed);
        let regularization = match self.config.sigma_regularization {
            Some(sigma) => 0.5 * velocities.squared_norm() / (sigma * sigma),
            None => 0.0,
        };
        Evaluation {
            flow,
            points,
            indices,
            terms,
            regularization,
        }
    }
}
