//! Images, resampling and transforms for diffeomorphic registration.
//!
//! Images carry per-axis spacing and use centered physical coordinates.
//! Fields are flattened to `[N, C]` tensors in row-major voxel order so that
//! every operation works for any image rank.

pub mod error;
pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use error::{CoreError, Result};
pub use image::Image;
pub use spatial::{Spacing, Vector};
