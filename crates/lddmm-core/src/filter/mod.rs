//! Filters acting on images and flattened fields.

pub mod separable;
pub mod gaussian;
pub mod downsample;
pub mod pyramid;
pub mod gradient;
pub mod resample;

pub use gaussian::GaussianFilter;
pub use downsample::DownsampleFilter;
pub use pyramid::{MultiscaleFactor, PyramidLevel};
pub use resample::{map_coordinates, resample_field, ResampleImageFilter};
