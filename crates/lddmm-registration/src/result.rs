//! Output of a registration.

use burn::tensor::backend::Backend;
use lddmm_core::image::Image;
use lddmm_core::transform::{AffineTransform, CoordinateMap};

use crate::progress::EnergyRecord;
use crate::velocity::VelocityFields;

/// Result of [`crate::multires::LddmmRegistration::register`].
#[derive(Debug, Clone)]
pub struct RegistrationResult<B: Backend, const D: usize> {
    /// On the reference grid: moving-image index coordinates to sample so
    /// that the moving image lands on the reference.
    pub moving_image_to_reference_image_transform: CoordinateMap<B, D>,
    /// On the moving grid: reference-image index coordinates to sample so
    /// that the reference lands on the moving image.
    pub reference_image_to_moving_image_transform: CoordinateMap<B, D>,
    /// Final affine, acting on centered physical coordinates.
    pub affine: AffineTransform<D>,
    /// Final velocity fields on the full-resolution reference grid.
    pub velocity_fields: VelocityFields<B, D>,
    /// One record per iteration of every level, in execution order.
    pub energy_history: Vec<EnergyRecord>,
    /// Matching energy of the composed maps at full resolution.
    pub final_matching_energy: f64,
}

impl<B: Backend, const D: usize> RegistrationResult<B, D> {
    /// Moving image resampled onto the reference grid.
    pub fn deform_moving(&self, moving: &Image<B, D>) -> Image<B, D> {
        self.moving_image_to_reference_image_transform.warp(moving)
    }

    /// Reference image resampled onto the moving grid.
    pub fn deform_reference(&self, reference: &Image<B, D>) -> Image<B, D> {
        self.reference_image_to_moving_image_transform.warp(reference)
    }

    pub fn last_record(&self) -> Option<&EnergyRecord> {
        self.energy_history.last()
    }

    pub fn first_record(&self) -> Option<&EnergyRecord> {
        self.energy_history.first()
    }
}
