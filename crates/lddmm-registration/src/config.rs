//! Registration configuration.
//!
//! Every option has a documented default; options are set with chained
//! `with_*` calls and checked once by [`RegistrationConfig::validate`].

use lddmm_core::filter::MultiscaleFactor;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};
use crate::validation;

/// Intensity map applied to the deformed moving image before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContrastModel {
    /// Intensities are compared as they are.
    #[default]
    Identity,
    /// A least-squares fit `a + b * M` is re-estimated every iteration.
    Linear,
}

/// Transformation class optimized during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterationPhase {
    /// Affine step projected onto rotations plus translation. The velocity
    /// fields still update once past the affine-only prefix.
    Rigid,
    /// Unconstrained affine step, velocity fields frozen.
    Affine,
    /// Affine step followed by a velocity field step.
    Deformative,
}

/// Configuration of an LDDMM registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Iterations per scale level. Default 300.
    pub num_iterations: usize,
    /// Leading iterations of each level that only update the affine. Default 100.
    pub num_affine_only_iterations: usize,
    /// Leading iterations of each level whose affine step is rigid. Default 50.
    pub num_rigid_affine_iterations: usize,
    /// Affine step size, 0 disables affine updates. Default 0.3.
    pub affine_stepsize: f64,
    /// Velocity field step size, 0 disables deformation. Default 0.
    pub deformative_stepsize: f64,
    /// Weight of the velocity penalty; `None` disables it.
    pub sigma_regularization: Option<f64>,
    /// Physical standard deviation of the smoothing kernel;
    /// `None` uses twice the largest reference spacing.
    pub smooth_length: Option<f64>,
    /// Number of velocity fields in the time discretization. Default 5.
    pub num_timesteps: usize,
    /// Expected intensity noise; `None` uses the standard deviation of the
    /// reference image at each level (1 for a constant image).
    pub sigma_matching: Option<f64>,
    /// Intensity model of the moving image. Default identity.
    pub contrast_model: ContrastModel,
    /// Downsampling factors processed in order; empty means a single level at full resolution.
    pub multiscales: Vec<MultiscaleFactor>,
    /// Homogeneous starting matrix mapping reference to moving physical space.
    pub initial_affine: Option<DMatrix<f64>>,
    /// Abort with a numerical instability error on a non-finite energy. Default true.
    pub check_numerical_stability: bool,
    /// Largest velocity change per iteration, in voxels of the current level. Default 1.
    pub velocity_step_clip: f64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            num_iterations: 300,
            num_affine_only_iterations: 100,
            num_rigid_affine_iterations: 50,
            affine_stepsize: 0.3,
            deformative_stepsize: 0.0,
            sigma_regularization: None,
            smooth_length: None,
            num_timesteps: 5,
            sigma_matching: None,
            contrast_model: ContrastModel::Identity,
            multiscales: Vec::new(),
            initial_affine: None,
            check_numerical_stability: true,
            velocity_step_clip: 1.0,
        }
    }
}

impl RegistrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_iterations(mut self, iterations: usize) -> Self {
        self.num_iterations = iterations;
        self
    }

    pub fn with_num_affine_only_iterations(mut self, iterations: usize) -> Self {
        self.num_affine_only_iterations = iterations;
        self
    }

    pub fn with_num_rigid_affine_iterations(mut self, iterations: usize) -> Self {
        self.num_rigid_affine_iterations = iterations;
        self
    }

    pub fn with_affine_stepsize(mut self, stepsize: f64) -> Self {
        self.affine_stepsize = stepsize;
        self
    }

    pub fn with_deformative_stepsize(mut self, stepsize: f64) -> Self {
        self.deformative_stepsize = stepsize;
        self
    }

    pub fn with_sigma_regularization(mut self, sigma: f64) -> Self {
        self.sigma_regularization = Some(sigma);
        self
    }

    pub fn with_smooth_length(mut self, length: f64) -> Self {
        self.smooth_length = Some(length);
        self
    }

    pub fn with_num_timesteps(mut self, timesteps: usize) -> Self {
        self.num_timesteps = timesteps;
        self
    }

    pub fn with_sigma_matching(mut self, sigma: f64) -> Self {
        self.sigma_matching = Some(sigma);
        self
    }

    pub fn with_contrast_model(mut self, model: ContrastModel) -> Self {
        self.contrast_model = model;
        self
    }

    pub fn with_multiscales(mut self, multiscales: Vec<MultiscaleFactor>) -> Self {
        self.multiscales = multiscales;
        self
    }

    pub fn with_initial_affine(mut self, matrix: DMatrix<f64>) -> Self {
        self.initial_affine = Some(matrix);
        self
    }

    pub fn with_velocity_step_clip(mut self, voxels: f64) -> Self {
        self.velocity_step_clip = voxels;
        self
    }

    /// Disable the non-finite energy check.
    pub fn without_numerical_checks(mut self) -> Self {
        self.check_numerical_stability = false;
        self
    }

    /// Scale schedule with the empty default resolved to full resolution.
    pub fn schedule(&self) -> Vec<MultiscaleFactor> {
        if self.multiscales.is_empty() {
            vec![MultiscaleFactor::Uniform(1.0)]
        } else {
            self.multiscales.clone()
        }
    }

    /// Phase of iteration `iteration` within a level.
    ///
    /// Rigid iterations come first, then affine-only iterations, then
    /// deformative ones.
    pub fn phase(&self, iteration: usize) -> IterationPhase {
        if iteration < self.num_rigid_affine_iterations {
            IterationPhase::Rigid
        } else if iteration < self.num_affine_only_iterations {
            IterationPhase::Affine
        } else {
            IterationPhase::Deformative
        }
    }

    /// Whether the affine step of iteration `iteration` is projected onto rotations.
    pub fn is_rigid(&self, iteration: usize) -> bool {
        iteration < self.num_rigid_affine_iterations
    }

    /// Whether iteration `iteration` updates the velocity fields.
    pub fn is_deformative(&self, iteration: usize) -> bool {
        iteration >= self.num_affine_only_iterations && self.deformative_stepsize > 0.0
    }

    /// Check every option that does not depend on the images.
    pub fn validate(&self) -> Result<()> {
        if self.num_timesteps == 0 {
            return Err(RegistrationError::invalid_configuration(
                "num_timesteps must be at least 1",
            ));
        }
        validation::validate_stepsize("affine_stepsize", self.affine_stepsize)?;
        validation::validate_stepsize("deformative_stepsize", self.deformative_stepsize)?;
        validation::validate_positive("velocity_step_clip", self.velocity_step_clip)?;
        if let Some(sigma) = self.sigma_regularization {
            validation::validate_positive("sigma_regularization", sigma)?;
        }
        if let Some(length) = self.smooth_length {
            validation::validate_positive("smooth_length", length)?;
        }
        if let Some(sigma) = self.sigma_matching {
            validation::validate_positive("sigma_matching", sigma)?;
        }
        for (level, factor) in self.multiscales.iter().enumerate() {
            let factors = match factor {
                MultiscaleFactor::Uniform(f) => vec![*f],
                MultiscaleFactor::PerAxis(fs) => fs.clone(),
            };
            if factors.is_empty() {
                return Err(RegistrationError::invalid_configuration(format!(
                    "multiscale level {} has no factors",
                    level
                )));
            }
            for f in factors {
                if !f.is_finite() || f <= 0.0 {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "multiscale level {} has invalid factor {}",
                        level, f
                    )));
                }
            }
        }
        if let Some(matrix) = &self.initial_affine {
            if matrix.iter().any(|v| !v.is_finite()) {
                return Err(RegistrationError::invalid_configuration(
                    "initial_affine contains non-finite entries",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistrationConfig::default();
        assert_eq!(config.num_iterations, 300);
        assert_eq!(config.num_affine_only_iterations, 100);
        assert_eq!(config.num_rigid_affine_iterations, 50);
        assert_eq!(config.affine_stepsize, 0.3);
        assert_eq!(config.deformative_stepsize, 0.0);
        assert_eq!(config.num_timesteps, 5);
        assert_eq!(config.contrast_model, ContrastModel::Identity);
        assert_eq!(config.schedule(), vec![MultiscaleFactor::Uniform(1.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_phase_schedule() {
        let config = RegistrationConfig::default()
            .with_num_rigid_affine_iterations(2)
            .with_num_affine_only_iterations(4)
            .with_deformative_stepsize(0.5);
        let phases: Vec<IterationPhase> = (0..6).map(|i| config.phase(i)).collect();
        assert_eq!(
            phases,
            vec![
                IterationPhase::Rigid,
                IterationPhase::Rigid,
                IterationPhase::Affine,
                IterationPhase::Affine,
                IterationPhase::Deformative,
                IterationPhase::Deformative,
            ]
        );
        assert!(config.is_deformative(4));
        assert!(!config.is_deformative(3));
    }

    #[test]
    fn test_rigid_after_affine_only_block() {
        // A rigid budget longer than the affine-only block keeps the affine rigid
        // while velocities already move.
        let config = RegistrationConfig::default()
            .with_num_rigid_affine_iterations(5)
            .with_num_affine_only_iterations(2);
        assert_eq!(config.phase(3), IterationPhase::Rigid);
        assert!(config.is_rigid(3));
    }

    #[test]
    fn test_validation_failures() {
        assert!(RegistrationConfig::default().with_num_timesteps(0).validate().is_err());
        assert!(RegistrationConfig::default().with_affine_stepsize(-0.1).validate().is_err());
        assert!(RegistrationConfig::default().with_deformative_stepsize(f64::NAN).validate().is_err());
        assert!(RegistrationConfig::default().with_sigma_matching(0.0).validate().is_err());
        assert!(RegistrationConfig::default().with_smooth_length(-1.0).validate().is_err());
        assert!(RegistrationConfig::default().with_velocity_step_clip(0.0).validate().is_err());
        assert!(RegistrationConfig::default()
            .with_multiscales(vec![MultiscaleFactor::from(0.0)])
            .validate()
            .is_err());
        assert!(RegistrationConfig::default()
            .with_multiscales(vec![MultiscaleFactor::PerAxis(vec![])])
            .validate()
            .is_err());
    }
}
