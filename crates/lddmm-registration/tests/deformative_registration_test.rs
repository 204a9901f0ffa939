mod common;

use common::{ellipsoid, ssd, Backend};
use lddmm_core::filter::ResampleImageFilter;
use lddmm_core::interpolation::LinearInterpolator;
use lddmm_core::transform::AffineTransform;
use lddmm_registration::{IterationPhase, LddmmRegistration, RegistrationConfig};

#[test]
fn test_deformation_only_reduces_mismatch() {
    let reference = ellipsoid([25, 25], [8.0, 8.0], 0.0, Some(1.0));
    let moving = ellipsoid([21, 29], [6.0, 10.0], 0.0, Some(1.0));

    let config = RegistrationConfig::default()
        .with_num_iterations(100)
        .with_num_affine_only_iterations(0)
        .with_affine_stepsize(0.0)
        .with_deformative_stepsize(0.5);
    let result = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&reference, &moving)
        .unwrap();

    assert!(result.affine.is_identity());

    let unregistered = ResampleImageFilter::new_from_reference(
        &reference,
        AffineTransform::<2>::identity(),
        LinearInterpolator::new(),
    )
    .apply(&moving);
    let before = ssd(&unregistered, &reference);
    let after = ssd(&result.deform_moving(&moving), &reference);
    assert!(after < 0.6 * before, "before {before}, after {after}");

    let first = result.first_record().unwrap();
    let last = result.last_record().unwrap();
    assert!(last.matching < first.matching);
    assert!(result
        .energy_history
        .iter()
        .all(|record| record.phase == IterationPhase::Rigid || record.phase == IterationPhase::Deformative));
}

#[test]
fn test_velocity_regularization_is_reported() {
    let reference = ellipsoid([15, 15], [5.0, 5.0], 0.0, Some(1.0));
    let moving = ellipsoid([15, 15], [4.0, 6.0], 0.0, Some(1.0));
    let config = RegistrationConfig::default()
        .with_num_iterations(5)
        .with_num_affine_only_iterations(0)
        .with_affine_stepsize(0.0)
        .with_deformative_stepsize(0.5)
        .with_sigma_regularization(10.0);
    let result = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&reference, &moving)
        .unwrap();
    assert_eq!(result.energy_history[0].regularization, 0.0);
    assert!(result.energy_history[4].regularization > 0.0);
}

#[test]
fn test_velocity_update_is_clipped_per_iteration() {
    let reference = ellipsoid([15, 15], [5.0, 5.0], 0.0, None);
    let moving = ellipsoid([15, 15], [3.0, 7.0], 0.0, None);
    let config = RegistrationConfig::default()
        .with_num_iterations(1)
        .with_num_affine_only_iterations(0)
        .with_affine_stepsize(0.0)
        .with_deformative_stepsize(1000.0)
        .with_velocity_step_clip(0.25);
    let result = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&reference, &moving)
        .unwrap();
    let magnitude = result.velocity_fields.max_magnitude();
    assert!(magnitude > 0.0);
    assert!(magnitude <= 0.25 + 1e-6);
}
