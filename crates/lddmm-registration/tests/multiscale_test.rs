mod common;

use std::sync::Arc;

use common::{ellipsoid, max_abs_diff, Backend};
use lddmm_core::filter::MultiscaleFactor;
use lddmm_registration::{
    HistoryCallback, LddmmRegistration, ProgressTracker, RegistrationConfig, RegistrationError,
};

fn schedule() -> Vec<MultiscaleFactor> {
    vec![
        MultiscaleFactor::from(5.0),
        (2.0, 3.0).into(),
        [3.0, 2.0].into(),
        1.0.into(),
    ]
}

#[test]
fn test_multiscale_identity() {
    let image = ellipsoid([21, 29], [8.0, 12.0], 0.0, None);
    let config = RegistrationConfig::default()
        .with_num_iterations(1)
        .with_multiscales(schedule());
    let history = HistoryCallback::new();
    let registration = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .with_progress(ProgressTracker::new().with_callback(Arc::new(history.clone())));
    let result = registration.register(&image, &image).unwrap();

    assert!(max_abs_diff(&result.deform_moving(&image), &image) <= 1e-9);
    assert!(max_abs_diff(&result.deform_reference(&image), &image) <= 1e-9);
    assert_eq!(result.velocity_fields.shape(), [21, 29]);

    let levels: Vec<usize> = result.energy_history.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![0, 1, 2, 3]);
    assert_eq!(history.get_history().len(), 4);
}

#[test]
fn test_multiscale_with_deformation_runs_every_level() {
    let reference = ellipsoid([21, 21], [7.0, 7.0], 0.0, Some(1.0));
    let moving = ellipsoid([21, 21], [6.0, 8.0], 0.0, Some(1.0));
    let config = RegistrationConfig::default()
        .with_num_iterations(4)
        .with_num_affine_only_iterations(0)
        .with_affine_stepsize(0.0)
        .with_deformative_stepsize(0.5)
        .with_multiscales(vec![2.0.into(), 1.0.into()]);
    let result = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&reference, &moving)
        .unwrap();
    assert_eq!(result.energy_history.len(), 8);
    assert!(result.velocity_fields.max_magnitude() > 0.0);
    assert_eq!(result.velocity_fields.shape(), [21, 21]);
}

#[test]
fn test_per_axis_factor_of_wrong_rank_is_rejected() {
    let image = ellipsoid([9, 9], [3.0, 3.0], 0.0, None);
    let config = RegistrationConfig::default().with_multiscales(vec![[2.0, 2.0, 2.0].into()]);
    let err = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&image, &image)
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
}

#[test]
fn test_factor_emptying_an_axis_is_rejected() {
    let image = ellipsoid([3, 9], [1.0, 3.0], 0.0, None);
    let config = RegistrationConfig::default().with_multiscales(vec![8.0.into()]);
    let err = LddmmRegistration::<Backend, 2>::new(config)
        .unwrap()
        .register(&image, &image)
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
}

#[test]
fn test_nonpositive_factor_is_rejected_at_construction() {
    let config = RegistrationConfig::default().with_multiscales(vec![0.0.into()]);
    assert!(LddmmRegistration::<Backend, 2>::new(config).is_err());
}
