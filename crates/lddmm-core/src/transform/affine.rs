//! Affine transform stored as a homogeneous matrix.
//!
//! The matrix is `(D + 1) x (D + 1)` with last row `[0, ..., 0, 1]` and maps
//! centered physical coordinates: `y = L x + t`.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::trait_::Transform;
use crate::error::{CoreError, Result};
use crate::image::grid;
use crate::spatial::Spacing;

/// Affine transform on physical coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform<const D: usize> {
    matrix: DMatrix<f64>,
}

impl<const D: usize> AffineTransform<D> {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: DMatrix::identity(D + 1, D + 1),
        }
    }

    /// Build from a homogeneous matrix.
    ///
    /// Fails when the matrix is not `(D + 1) x (D + 1)`. The last row is
    /// reset to `[0, ..., 0, 1]`.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self> {
        if matrix.shape() != (D + 1, D + 1) {
            return Err(CoreError::ShapeMismatch {
                expected: vec![D + 1, D + 1],
                actual: vec![matrix.nrows(), matrix.ncols()],
            });
        }
        let mut matrix = matrix;
        for c in 0..D {
            matrix[(D, c)] = 0.0;
        }
        matrix[(D, D)] = 1.0;
        Ok(Self { matrix })
    }

    /// Build from a linear part and a translation.
    pub fn from_parts(linear: &DMatrix<f64>, translation: &DVector<f64>) -> Result<Self> {
        if linear.shape() != (D, D) || translation.len() != D {
            return Err(CoreError::ShapeMismatch {
                expected: vec![D, D],
                actual: vec![linear.nrows(), linear.ncols()],
            });
        }
        let mut matrix = DMatrix::identity(D + 1, D + 1);
        matrix.view_mut((0, 0), (D, D)).copy_from(linear);
        matrix.view_mut((0, D), (D, 1)).copy_from(translation);
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// The `D x D` linear part.
    pub fn linear(&self) -> DMatrix<f64> {
        self.matrix.view((0, 0), (D, D)).into_owned()
    }

    pub fn translation(&self) -> DVector<f64> {
        self.matrix.view((0, D), (D, 1)).column(0).into_owned()
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == DMatrix::identity(D + 1, D + 1)
    }

    /// Inverse transform, `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let linear = self.linear();
        if linear.determinant().abs() < 1e-12 {
            return None;
        }
        self.matrix
            .clone()
            .try_inverse()
            .map(|matrix| Self { matrix })
    }

    /// `self` after `other`: `x -> self(other(x))`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            matrix: &self.matrix * &other.matrix,
        }
    }

    /// The same map acting on voxel indices of two centered grids.
    ///
    /// Sends indices of the `from` grid to continuous indices of the `to`
    /// grid. The identity between equal grids gives the exact identity
    /// matrix.
    pub fn to_index_space(
        &self,
        from_shape: &[usize; D],
        from_spacing: &Spacing<D>,
        to_shape: &[usize; D],
        to_spacing: &Spacing<D>,
    ) -> Self {
        let from_center = grid::center_indices(from_shape);
        let to_center = grid::center_indices(to_shape);
        let mut matrix = DMatrix::identity(D + 1, D + 1);
        for r in 0..D {
            let mut offset = to_center[r] + self.matrix[(r, D)] / to_spacing[r];
            for c in 0..D {
                matrix[(r, c)] = self.matrix[(r, c)] * from_spacing[c] / to_spacing[r];
                offset -= matrix[(r, c)] * from_center[c];
            }
            matrix[(r, D)] = offset;
        }
        Self { matrix }
    }

    /// Apply to one physical point.
    pub fn transform_point(&self, point: &[f64; D]) -> [f64; D] {
        let mut out = [0.0; D];
        for (r, value) in out.iter_mut().enumerate() {
            *value = self.matrix[(r, D)];
            for (c, x) in point.iter().enumerate() {
                *value += self.matrix[(r, c)] * x;
            }
        }
        out
    }

    /// Apply the linear part and translation to `[N, D]` points on `device`.
    fn apply_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        // points are rows, so multiply by the transposed linear part.
        let mut linear_t = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                linear_t.push(self.matrix[(c, r)]);
            }
        }
        let linear_t = Tensor::<B, 2>::from_data(
            TensorData::new(linear_t, [D, D]).convert::<B::FloatElem>(),
            &device,
        );
        let translation: Vec<f64> = (0..D).map(|r| self.matrix[(r, D)]).collect();
        let translation = Tensor::<B, 2>::from_data(
            TensorData::new(translation, [1, D]).convert::<B::FloatElem>(),
            &device,
        );
        points.matmul(linear_t) + translation
    }
}

impl<const D: usize> Default for AffineTransform<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for AffineTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.apply_tensor(points)
    }
}
