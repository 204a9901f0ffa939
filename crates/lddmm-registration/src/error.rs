//! Error types for registration operations.
//!
//! Configuration problems are reported before any optimization work starts;
//! numerical problems are reported as soon as they are detected.

use lddmm_core::CoreError;
use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Invalid configuration or input images.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: Vec<usize>, actual: Vec<usize>) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}

impl From<CoreError> for RegistrationError {
    fn from(err: CoreError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::invalid_configuration("num_timesteps must be at least 1");
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "Invalid configuration: num_timesteps must be at least 1");
    }

    #[test]
    fn test_numerical_instability_display() {
        let err = RegistrationError::numerical_instability("energy is NaN");
        assert_eq!(err.to_string(), "Numerical instability: energy is NaN");
    }

    #[test]
    fn test_from_core_error() {
        let err: RegistrationError = CoreError::InvalidFactor { axis: 0, factor: 0.0 }.into();
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));

        let err: RegistrationError = CoreError::ShapeMismatch {
            expected: vec![2],
            actual: vec![3],
        }
        .into();
        assert_eq!(
            err,
            RegistrationError::invalid_configuration("Shape mismatch: expected [2], got [3]")
        );
    }
}
