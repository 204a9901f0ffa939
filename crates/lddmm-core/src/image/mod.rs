//! Image types and operations.
//!
//! This module provides the Image type and the coordinate grids
//! used to move between index and physical space.

pub mod image;
pub mod grid;

pub use image::Image;
pub use grid::{generate_grid, generate_physical_grid};
