//! Matching energies between the reference and the deformed moving image.

pub mod mse;

pub use mse::{ContrastMap, MatchingTerms, MeanSquaredError};
