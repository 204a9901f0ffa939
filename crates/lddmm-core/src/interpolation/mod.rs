//! Interpolation types and operations.
//!
//! This module provides the interpolation trait and the multilinear
//! implementation used for every resampling step.

pub mod trait_;
pub mod linear;

pub use trait_::{BoundaryMode, Interpolator};
pub use linear::LinearInterpolator;
