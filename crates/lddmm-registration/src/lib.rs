//! Large deformation diffeomorphic metric mapping (LDDMM) registration.
//!
//! A moving image is aligned to a reference image by an affine transform
//! composed with the flow of time-varying velocity fields. The optimization
//! runs coarse-to-fine over a scale schedule and produces index-space
//! coordinate maps in both directions.
//!
//! ```rust,ignore
//! use lddmm_registration::{LddmmRegistration, RegistrationConfig};
//!
//! let config = RegistrationConfig::default()
//!     .with_num_affine_only_iterations(0)
//!     .with_deformative_stepsize(0.5);
//! let result = LddmmRegistration::new(config)?.register(&reference, &moving)?;
//! let warped = result.deform_moving(&moving);
//! ```

pub mod error;
pub mod config;
pub mod validation;
pub mod progress;
pub mod velocity;
pub mod integrator;
pub mod metric;
pub mod regularization;
pub mod optimizer;
pub mod registration;
pub mod multires;
pub mod result;

pub use error::{RegistrationError, Result};
pub use config::{ContrastModel, IterationPhase, RegistrationConfig};
pub use progress::{
    ConsoleProgressCallback, EnergyRecord, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker,
};
pub use velocity::VelocityFields;
pub use integrator::{DiffeomorphicFlow, FlowIntegrator};
pub use multires::LddmmRegistration;
pub use result::RegistrationResult;
