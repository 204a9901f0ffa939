//! Time-discretized velocity fields.
//!
//! A sequence of `T` fields, each `[N, D]` in physical units per unit time,
//! sampled on the reference grid of one scale level.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use lddmm_core::filter::resample_field;
use lddmm_core::image::grid;
use lddmm_core::spatial::Spacing;

use crate::error::{RegistrationError, Result};

/// Owned velocity field sequence on one grid.
#[derive(Debug, Clone)]
pub struct VelocityFields<B: Backend, const D: usize> {
    fields: Vec<Tensor<B, 2>>,
    shape: [usize; D],
    spacing: Spacing<D>,
}

impl<B: Backend, const D: usize> VelocityFields<B, D> {
    /// `num_timesteps` zero fields.
    pub fn zeros(num_timesteps: usize, shape: [usize; D], spacing: Spacing<D>, device: &B::Device) -> Self {
        let count = grid::num_voxels(&shape);
        Self {
            fields: (0..num_timesteps)
                .map(|_| Tensor::zeros([count, D], device))
                .collect(),
            shape,
            spacing,
        }
    }

    /// Wrap existing fields, checking that each is `[N, D]` for `shape`.
    pub fn new(fields: Vec<Tensor<B, 2>>, shape: [usize; D], spacing: Spacing<D>) -> Result<Self> {
        if fields.is_empty() {
            return Err(RegistrationError::invalid_configuration(
                "velocity field sequence must contain at least one time step",
            ));
        }
        let expected = [grid::num_voxels(&shape), D];
        for field in &fields {
            let actual = field.dims();
            if actual != expected {
                return Err(RegistrationError::shape_mismatch(expected.to_vec(), actual.to_vec()));
            }
        }
        Ok(Self {
            fields,
            shape,
            spacing,
        })
    }

    pub fn num_timesteps(&self) -> usize {
        self.fields.len()
    }

    /// Time step `1 / T`.
    pub fn dt(&self) -> f64 {
        1.0 / self.fields.len() as f64
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn fields(&self) -> &[Tensor<B, 2>] {
        &self.fields
    }

    pub fn field(&self, t: usize) -> &Tensor<B, 2> {
        &self.fields[t]
    }

    pub fn into_fields(self) -> Vec<Tensor<B, 2>> {
        self.fields
    }

    /// Replace the field of time step `t`.
    pub fn set_field(&mut self, t: usize, field: Tensor<B, 2>) {
        self.fields[t] = field;
    }

    /// Resample every time step onto another centered grid.
    ///
    /// The result owns fresh tensors; outside the current grid the edge
    /// values are repeated.
    pub fn resample_to(&self, shape: [usize; D], spacing: Spacing<D>) -> Self {
        let from_spacing = self.spacing.to_vec();
        let to_spacing = spacing.to_vec();
        let fields = self
            .fields
            .iter()
            .map(|field| resample_field(field, &self.shape, &from_spacing, &shape, &to_spacing))
            .collect();
        Self {
            fields,
            shape,
            spacing,
        }
    }

    /// `sum_t sum_x |v_t(x)|^2 * voxel volume * dt`.
    pub fn squared_norm(&self) -> f64 {
        let volume: f64 = (0..D).map(|axis| self.spacing[axis]).product();
        let dt = self.dt();
        self.fields
            .iter()
            .map(|field| field.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>())
            .sum::<f64>()
            * volume
            * dt
    }

    /// Largest velocity magnitude over all time steps.
    pub fn max_magnitude(&self) -> f64 {
        self.fields
            .iter()
            .map(|field| {
                field
                    .clone()
                    .powf_scalar(2.0)
                    .sum_dim(1)
                    .max()
                    .into_scalar()
                    .elem::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use lddmm_core::spatial::Spacing2;

    type B = NdArray<f32>;

    #[test]
    fn test_zeros() {
        let device = Default::default();
        let v = VelocityFields::<B, 2>::zeros(5, [4, 6], Spacing2::uniform(1.0), &device);
        assert_eq!(v.num_timesteps(), 5);
        assert_eq!(v.field(0).dims(), [24, 2]);
        assert_eq!(v.dt(), 0.2);
        assert_eq!(v.squared_norm(), 0.0);
        assert_eq!(v.max_magnitude(), 0.0);
    }

    #[test]
    fn test_new_checks_shapes() {
        let device = Default::default();
        let ok = VelocityFields::<B, 2>::new(vec![Tensor::zeros([6, 2], &device)], [2, 3], Spacing2::uniform(1.0));
        assert!(ok.is_ok());
        let wrong = VelocityFields::<B, 2>::new(vec![Tensor::zeros([6, 3], &device)], [2, 3], Spacing2::uniform(1.0));
        assert!(matches!(wrong, Err(RegistrationError::ShapeMismatch { .. })));
        let empty = VelocityFields::<B, 2>::new(vec![], [2, 3], Spacing2::uniform(1.0));
        assert!(empty.is_err());
    }

    #[test]
    fn test_resample_constant_field() {
        let device = Default::default();
        let field = Tensor::<B, 2>::ones([25, 2], &device).mul_scalar(0.5);
        let v = VelocityFields::new(vec![field.clone(), field], [5, 5], Spacing2::uniform(1.0)).unwrap();
        let coarse = v.resample_to([3, 2], Spacing2::new([2.0, 3.0]));
        assert_eq!(coarse.num_timesteps(), 2);
        assert_eq!(coarse.field(1).dims(), [6, 2]);
        let values: Vec<f64> = coarse.field(1).clone().into_data().iter::<f64>().collect();
        assert!(values.iter().all(|&x| (x - 0.5).abs() < 1e-6));
        assert!((v.max_magnitude() - 0.5f64.hypot(0.5)).abs() < 1e-6);
    }
}
