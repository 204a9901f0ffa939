//! Velocity field integration.
//!
//! Maps are stored as displacement fields on the velocity grid and built by
//! Euler composition with `dt = 1 / T`:
//!
//! * inverse path: `phi_{0,0} = id`, `phi_{t+1,0} = phi_{t,0} o (id - dt v_t)`
//! * forward path: `phi_{T,1} = id`, `phi_{t,1} = phi_{t+1,1} o (id + dt v_t)`

use burn::tensor::backend::Backend;
use lddmm_core::transform::DisplacementField;

use crate::error::Result;
use crate::velocity::VelocityFields;

/// Forward and inverse maps of a flow at every time step.
#[derive(Debug, Clone)]
pub struct DiffeomorphicFlow<B: Backend, const D: usize> {
    /// `phi_{t,0}` for `t = 0..=T`.
    to_start: Vec<DisplacementField<B, D>>,
    /// `phi_{t,1}` for `t = 0..=T`.
    to_end: Vec<DisplacementField<B, D>>,
}

impl<B: Backend, const D: usize> DiffeomorphicFlow<B, D> {
    pub fn num_timesteps(&self) -> usize {
        self.to_start.len() - 1
    }

    /// `phi_{t,0}`, pulling points at time `t` back to time 0.
    pub fn to_start(&self, t: usize) -> &DisplacementField<B, D> {
        &self.to_start[t]
    }

    /// `phi_{t,1}`, pushing points at time `t` to time 1.
    pub fn to_end(&self, t: usize) -> &DisplacementField<B, D> {
        &self.to_end[t]
    }

    /// The forward map `phi_{0,1}`.
    pub fn forward(&self) -> &DisplacementField<B, D> {
        &self.to_end[0]
    }

    /// The inverse map `phi_{1,0}`.
    pub fn inverse(&self) -> &DisplacementField<B, D> {
        &self.to_start[self.num_timesteps()]
    }

    pub fn into_maps(self) -> (DisplacementField<B, D>, DisplacementField<B, D>) {
        let mut to_start = self.to_start;
        let mut to_end = self.to_end;
        let inverse = to_start.swap_remove(to_start.len() - 1);
        let forward = to_end.swap_remove(0);
        (forward, inverse)
    }
}

/// Velocity field integrator using Euler composition.
pub struct FlowIntegrator<B: Backend> {
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> Default for FlowIntegrator<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> FlowIntegrator<B> {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    /// Integrate `velocities` into the forward and inverse flow.
    pub fn integrate<const D: usize>(&self, velocities: &VelocityFields<B, D>) -> Result<DiffeomorphicFlow<B, D>> {
        let shape = velocities.shape();
        let spacing = *velocities.spacing();
        let timesteps = velocities.num_timesteps();
        let dt = velocities.dt();
        let device = velocities.field(0).device();

        let identity = DisplacementField::zeros(shape, spacing, &device);
        let points = identity.grid_points();

        let mut to_start = Vec::with_capacity(timesteps + 1);
        to_start.push(identity.clone());
        for t in 0..timesteps {
            let step = velocities.field(t).clone().mul_scalar(dt);
            let previous = &to_start[t];
            let displacement = previous.sample(points.clone() - step.clone()) - step;
            let map = DisplacementField::new(displacement, shape, spacing)?;
            to_start.push(map);
        }

        let mut to_end: Vec<DisplacementField<B, D>> = Vec::with_capacity(timesteps + 1);
        to_end.push(identity);
        for t in (0..timesteps).rev() {
            let step = velocities.field(t).clone().mul_scalar(dt);
            let next = &to_end[to_end.len() - 1];
            let displacement = next.sample(points.clone() + step.clone()) + step;
            let map = DisplacementField::new(displacement, shape, spacing)?;
            to_end.push(map);
        }
        to_end.reverse();

        Ok(DiffeomorphicFlow { to_start, to_end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use lddmm_core::spatial::Spacing2;

    type B = NdArray<f32>;

    #[test]
    fn test_zero_velocity_gives_identity() {
        let device = Default::default();
        let v = VelocityFields::<B, 2>::zeros(4, [5, 7], Spacing2::new([1.0, 2.0]), &device);
        let flow = FlowIntegrator::new().integrate(&v).unwrap();
        assert_eq!(flow.num_timesteps(), 4);
        for t in 0..=4 {
            assert_eq!(flow.to_start(t).max_displacement(), 0.0);
            assert_eq!(flow.to_end(t).max_displacement(), 0.0);
        }
    }

    #[test]
    fn test_constant_velocity_is_translation() {
        let device = Default::default();
        let field = Tensor::<B, 2>::ones([35, 2], &device).mul_scalar(0.5);
        let v = VelocityFields::new(vec![field.clone(), field], [5, 7], Spacing2::uniform(1.0)).unwrap();
        let (forward, inverse) = FlowIntegrator::new().integrate(&v).unwrap().into_maps();

        let f: Vec<f64> = forward.displacement().clone().into_data().iter::<f64>().collect();
        let i: Vec<f64> = inverse.displacement().clone().into_data().iter::<f64>().collect();
        assert!(f.iter().all(|&x| (x - 0.5).abs() < 1e-6));
        assert!(i.iter().all(|&x| (x + 0.5).abs() < 1e-6));
    }
}
