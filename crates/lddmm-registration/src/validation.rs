//! Validation utilities for registration operations.
//!
//! This module provides the checks run before optimization starts and the
//! numerical guards run while it proceeds.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use lddmm_core::image::Image;

use crate::error::{RegistrationError, Result};

/// Validate a step size: finite and non-negative. Zero disables the step.
pub fn validate_stepsize(name: &str, stepsize: f64) -> Result<()> {
    if !stepsize.is_finite() || stepsize < 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} must be finite and non-negative, got {}",
            name, stepsize
        )));
    }
    Ok(())
}

/// Validate a strictly positive finite parameter.
pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate an input image: no empty axis, positive finite spacing, finite samples.
pub fn validate_image<B: Backend, const D: usize>(name: &str, image: &Image<B, D>) -> Result<()> {
    image.validate().map_err(|err| {
        RegistrationError::invalid_configuration(format!("{}: {}", name, err))
    })?;
    let sum = image.data().clone().abs().sum().into_scalar().elem::<f64>();
    if !sum.is_finite() {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} contains non-finite samples",
            name
        )));
    }
    Ok(())
}

/// Fail on a non-finite energy when the guard is enabled.
pub fn check_energy(energy: f64, enabled: bool, context: impl FnOnce() -> String) -> Result<()> {
    if enabled && !energy.is_finite() {
        return Err(RegistrationError::numerical_instability(format!(
            "non-finite energy {} {}",
            energy,
            context()
        )));
    }
    Ok(())
}

/// Whether every element of `tensor` is zero.
pub fn is_all_zero<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> bool {
    tensor.clone().abs().max().into_scalar().elem::<f64>() == 0.0
}
