#![allow(dead_code)]

use burn_ndarray::NdArray;
use lddmm_core::image::Image;
use lddmm_core::spatial::Spacing;
use lddmm_registration::EnergyRecord;

pub type Backend = NdArray<f32>;

/// Ellipsoid centered on the grid, rotated by `angle` in the plane of the
/// first two axes. `edge` is the half-width of a tanh edge in voxels;
/// `None` gives a binary image.
pub fn ellipsoid<const D: usize>(
    shape: [usize; D],
    radii: [f64; D],
    angle: f64,
    edge: Option<f64>,
) -> Image<Backend, D> {
    spaced_ellipsoid(shape, radii, angle, edge, Spacing::<D>::uniform(1.0))
}

/// [`ellipsoid`] on a grid with the given voxel spacing; radii stay in voxels.
pub fn spaced_ellipsoid<const D: usize>(
    shape: [usize; D],
    radii: [f64; D],
    angle: f64,
    edge: Option<f64>,
    spacing: Spacing<D>,
) -> Image<Backend, D> {
    let count: usize = shape.iter().product();
    let (sin, cos) = angle.sin_cos();
    let mut values = Vec::with_capacity(count);
    for flat in 0..count {
        let mut rest = flat;
        let mut coords = [0.0; D];
        for axis in (0..D).rev() {
            let index = rest % shape[axis];
            rest /= shape[axis];
            coords[axis] = index as f64 - (shape[axis] as f64 - 1.0) / 2.0;
        }
        if D >= 2 {
            // Undo the rotation so the ellipsoid is axis-aligned in `coords`.
            let (a, b) = (coords[0], coords[1]);
            coords[0] = cos * a + sin * b;
            coords[1] = -sin * a + cos * b;
        }
        let rho = coords
            .iter()
            .zip(radii.iter())
            .map(|(c, r)| (c / r) * (c / r))
            .sum::<f64>()
            .sqrt();
        let value = match edge {
            None => {
                if rho <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Some(width) => {
                let mean_radius = radii.iter().sum::<f64>() / D as f64;
                0.5 * (1.0 - ((rho - 1.0) * mean_radius / width).tanh())
            }
        };
        values.push(value);
    }
    Image::from_values(values, shape, spacing, &Default::default())
        .expect("phantom shape is valid")
}

/// Sum of squared differences between two images on the same grid.
pub fn ssd<const D: usize>(a: &Image<Backend, D>, b: &Image<Backend, D>) -> f64 {
    a.to_values()
        .iter()
        .zip(b.to_values())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Consecutive records of one level whose total energy went up.
pub fn energy_increases(history: &[EnergyRecord]) -> Vec<(usize, f64, f64)> {
    history
        .windows(2)
        .filter(|pair| pair[0].level == pair[1].level && pair[1].total() > pair[0].total())
        .map(|pair| (pair[1].iteration, pair[0].total(), pair[1].total()))
        .collect()
}

/// Largest absolute difference between two images on the same grid.
pub fn max_abs_diff<const D: usize>(a: &Image<Backend, D>, b: &Image<Backend, D>) -> f64 {
    a.to_values()
        .iter()
        .zip(b.to_values())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
