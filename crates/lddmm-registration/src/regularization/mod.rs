//! Regularization of velocity field updates.
//!
//! The matching gradient is projected through a smoothing operator before
//! it updates the velocity fields, which keeps the resulting flows smooth
//! and invertible.

pub mod trait_;
pub mod gaussian;

pub use trait_::Regularizer;
pub use gaussian::GaussianRegularizer;
