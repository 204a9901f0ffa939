//! Optimizers for the affine and the deformative components.
//!
//! Both optimizers are explicit first/second order updates computed from
//! closed-form gradients; no autodiff graph is built.

pub mod gradient_clipping;
pub mod affine;
pub mod deformative;

pub use gradient_clipping::GradientClipping;
pub use affine::{project_rigid, AffineEstimator, AffineProposal};
pub use deformative::{DeformativeOptimizer, MatchingContext, OptimizerState};
