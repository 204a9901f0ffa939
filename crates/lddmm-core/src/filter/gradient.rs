//! Finite-difference derivatives of sampled fields.
//!
//! Derivatives are taken in physical units with central differences inside
//! the grid and one-sided differences on its faces.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::separable::difference_along_axis;

/// Derivative of every channel of `field` along `axis`.
pub fn partial_derivative<B: Backend>(
    field: Tensor<B, 2>,
    shape: &[usize],
    spacing: &[f64],
    axis: usize,
) -> Tensor<B, 2> {
    difference_along_axis(field, shape, axis, spacing[axis])
}

/// Gradient of a scalar `[N, 1]` field, returned as `[N, D]`.
pub fn spatial_gradient<B: Backend>(
    field: Tensor<B, 2>,
    shape: &[usize],
    spacing: &[f64],
) -> Tensor<B, 2> {
    let columns: Vec<Tensor<B, 2>> = (0..shape.len())
        .map(|axis| partial_derivative(field.clone(), shape, spacing, axis))
        .collect();
    Tensor::cat(columns, 1)
}

/// Determinant of the Jacobian of `x + u(x)` for a `[N, D]` displacement `u`.
///
/// Returns a `[N, 1]` column. The determinant is expanded over all
/// permutations, which is fine for the small ranks images come in.
pub fn jacobian_determinant<B: Backend>(
    displacement: Tensor<B, 2>,
    shape: &[usize],
    spacing: &[f64],
) -> Tensor<B, 2> {
    let rank = shape.len();
    let [count, _] = displacement.dims();

    // entries[c][k] = d(x_c + u_c) / dx_k
    let derivatives: Vec<Tensor<B, 2>> = (0..rank)
        .map(|axis| partial_derivative(displacement.clone(), shape, spacing, axis))
        .collect();
    let entries: Vec<Vec<Tensor<B, 2>>> = (0..rank)
        .map(|c| {
            (0..rank)
                .map(|k| {
                    let entry = derivatives[k].clone().slice([0..count, c..c + 1]);
                    if c == k {
                        entry.add_scalar(1.0)
                    } else {
                        entry
                    }
                })
                .collect()
        })
        .collect();

    let mut determinant = Tensor::<B, 2>::zeros([count, 1], &displacement.device());
    for (perm, sign) in permutations(rank) {
        let mut term = entries[0][perm[0]].clone();
        for c in 1..rank {
            term = term * entries[c][perm[c]].clone();
        }
        determinant = if sign > 0 { determinant + term } else { determinant - term };
    }
    determinant
}

/// All permutations of `0..n` with their signs.
fn permutations(n: usize) -> Vec<(Vec<usize>, i32)> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }

    let mut all = Vec::new();
    extend(&mut Vec::with_capacity(n), &mut vec![false; n], &mut all);
    all.into_iter()
        .map(|perm| {
            let inversions = (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .filter(|&(i, j)| perm[i] > perm[j])
                .count();
            let sign = if inversions % 2 == 0 { 1 } else { -1 };
            (perm, sign)
        })
        .collect()
}
