//! Spatial types for per-axis physical quantities.
//!
//! All types are based on nalgebra.

pub mod vector;
pub mod spacing;

pub use vector::Vector;
pub use spacing::Spacing;

pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Spacing2 = Spacing<2>;
pub type Spacing3 = Spacing<3>;
