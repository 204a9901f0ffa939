//! Transform types and operations.
//!
//! This module provides the transform trait, the affine and dense
//! displacement transforms, and the index-space coordinate maps produced
//! by registration.

pub mod trait_;
pub mod affine;
pub mod displacement_field;
pub mod coordinate_map;

pub use trait_::Transform;
pub use affine::AffineTransform;
pub use displacement_field::DisplacementField;
pub use coordinate_map::CoordinateMap;
