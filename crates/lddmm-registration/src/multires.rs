//! Coarse-to-fine LDDMM registration driver.

use std::time::Instant;

use burn::tensor::backend::Backend;

use lddmm_core::filter::{DownsampleFilter, PyramidLevel};
use lddmm_core::image::{grid, Image};
use lddmm_core::transform::{AffineTransform, CoordinateMap, Transform};

use crate::config::RegistrationConfig;
use crate::error::{RegistrationError, Result};
use crate::integrator::FlowIntegrator;
use crate::metric::MeanSquaredError;
use crate::progress::ProgressTracker;
use crate::registration::LevelRegistration;
use crate::result::RegistrationResult;
use crate::validation;
use crate::velocity::VelocityFields;

/// LDDMM registration of a moving image onto a reference image.
///
/// Runs every level of the scale schedule in order, carrying the affine and
/// the velocity fields from one level to the next, then composes index-space
/// maps between the full-resolution grids.
pub struct LddmmRegistration<B: Backend, const D: usize> {
    config: RegistrationConfig,
    progress: ProgressTracker,
    initial_velocities: Option<VelocityFields<B, D>>,
}

impl<B: Backend, const D: usize> LddmmRegistration<B, D> {
    /// Create a registration; the configuration is validated immediately.
    pub fn new(config: RegistrationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: ProgressTracker::new(),
            initial_velocities: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Start from existing velocity fields instead of zeros.
    ///
    /// They are resampled onto the first level; their number of time steps
    /// must match the configuration.
    pub fn with_initial_velocity_fields(mut self, velocities: VelocityFields<B, D>) -> Self {
        self.initial_velocities = Some(velocities);
        self
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register `moving` onto `reference`.
    pub fn register(
        &self,
        reference: &Image<B, D>,
        moving: &Image<B, D>,
    ) -> Result<RegistrationResult<B, D>> {
        let result = self.run(reference, moving);
        match &result {
            Ok(output) => self.progress.complete(output.last_record()),
            Err(err) => {
                tracing::warn!("Registration failed: {}", err);
                self.progress.error(&err.to_string());
            }
        }
        result
    }

    fn initial_affine(&self) -> Result<AffineTransform<D>> {
        match &self.config.initial_affine {
            Some(matrix) => Ok(AffineTransform::from_matrix(matrix.clone())?),
            None => Ok(AffineTransform::identity()),
        }
    }

    fn sigma_matching(&self, reference: &Image<B, D>) -> f64 {
        self.config.sigma_matching.unwrap_or_else(|| {
            let (_, std) = reference.mean_std();
            if std > 0.0 && std.is_finite() {
                std
            } else {
                1.0
            }
        })
    }

    fn run(&self, reference: &Image<B, D>, moving: &Image<B, D>) -> Result<RegistrationResult<B, D>> {
        validation::validate_image("reference", reference)?;
        validation::validate_image("moving", moving)?;
        let schedule = self.config.schedule();
        for factor in &schedule {
            let filter = DownsampleFilter::<B>::new(factor.per_axis(D)?);
            filter.output_shape(&reference.shape())?;
            filter.output_shape(&moving.shape())?;
        }
        let mut affine = self.initial_affine()?;
        if let Some(velocities) = &self.initial_velocities {
            if velocities.num_timesteps() != self.config.num_timesteps {
                return Err(RegistrationError::invalid_configuration(format!(
                    "initial velocity fields have {} time steps, expected {}",
                    velocities.num_timesteps(),
                    self.config.num_timesteps
                )));
            }
        }

        let device = reference.device();
        let started = Instant::now();
        self.progress.start();
        tracing::info!(
            "Registering moving {:?} onto reference {:?} over {} levels",
            moving.shape(),
            reference.shape(),
            schedule.len()
        );

        let mut history = Vec::new();
        let mut velocities = self.initial_velocities.clone();
        for (level, factor) in schedule.iter().enumerate() {
            let reference_level = PyramidLevel::build(reference, factor)?.into_image();
            let moving_level = PyramidLevel::build(moving, factor)?.into_image();
            let shape = reference_level.shape();
            let spacing = *reference_level.spacing();

            self.progress.start_level(level, &shape);
            tracing::info!(
                "Starting level {}/{}: reference {:?}, moving {:?}",
                level + 1,
                schedule.len(),
                shape,
                moving_level.shape()
            );

            let level_velocities = match velocities.take() {
                Some(previous) => previous.resample_to(shape, spacing),
                None => VelocityFields::zeros(self.config.num_timesteps, shape, spacing, &device),
            };
            let metric = MeanSquaredError::new(self.sigma_matching(&reference_level), self.config.contrast_model);
            let engine = LevelRegistration::new(&self.config, level, reference_level, moving_level, metric);
            let (next_affine, next_velocities) =
                engine.execute(affine, level_velocities, &self.progress, &mut history)?;
            affine = next_affine;
            velocities = Some(next_velocities);
        }

        let shape = reference.shape();
        let spacing = *reference.spacing();
        let velocities = match velocities {
            Some(v) => v.resample_to(shape, spacing),
            None => VelocityFields::zeros(self.config.num_timesteps, shape, spacing, &device),
        };
        let flow = FlowIntegrator::new().integrate(&velocities)?;
        let (forward, inverse) = flow.into_maps();
        let inverse_affine = affine.inverse().ok_or_else(|| {
            RegistrationError::numerical_instability("final affine matrix is singular")
        })?;

        // Both maps are composed on voxel indices with f64 affine entries.
        // reference indices -> phi_{1,0} -> A -> moving indices
        let moving_indices = inverse.indices_through(&affine, &moving.shape(), moving.spacing());
        let moving_image_to_reference_image_transform = CoordinateMap::new(shape, spacing, moving_indices)?;

        // moving indices -> A^-1 -> phi_{0,1} -> reference indices
        let base = inverse_affine
            .to_index_space(&moving.shape(), moving.spacing(), &shape, &spacing)
            .transform_points(moving.index_grid());
        let offset = forward
            .sample_at_indices(base.clone())
            .div(grid::row_tensor::<B>(&spacing.to_vec(), &device));
        let reference_image_to_moving_image_transform =
            CoordinateMap::new(moving.shape(), *moving.spacing(), base + offset)?;

        let metric = MeanSquaredError::new(self.sigma_matching(reference), self.config.contrast_model);
        let deformed = moving_image_to_reference_image_transform.warp(moving).to_column();
        let final_matching_energy = metric.evaluate_deformed(reference, deformed).energy;
        tracing::info!(
            "Registration finished in {:.2?}, final matching energy {:.6}",
            started.elapsed(),
            final_matching_energy
        );

        Ok(RegistrationResult {
            moving_image_to_reference_image_transform,
            reference_image_to_moving_image_transform,
            affine,
            velocity_fields: velocities,
            energy_history: history,
            final_matching_energy,
        })
    }
}
