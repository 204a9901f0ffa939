use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use lddmm_core::image::Image;
use lddmm_core::spatial::Spacing;
use lddmm_core::transform::{AffineTransform, Transform};
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

type Backend = NdArray<f32>;
const D: usize = 3;

fn points(values: [f64; D]) -> Tensor<Backend, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), [1, D]).convert::<f32>(), &Default::default())
}

fn host(t: Tensor<Backend, 2>) -> Vec<f64> {
    t.into_data().iter::<f64>().collect()
}

proptest! {
    #[test]
    fn test_physical_index_roundtrip(
        nx in 1usize..20, ny in 1usize..20, nz in 1usize..20,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let device = Default::default();
        let data = Tensor::<Backend, D>::zeros([nx, ny, nz], &device);
        let image = Image::new(data, Spacing::<D>::new([sx, sy, sz]));

        let index = image.physical_to_index_tensor(points([px, py, pz]));
        let recovered = host(image.index_to_physical_tensor(index));

        prop_assert!((px - recovered[0]).abs() < 1e-3, "X mismatch: {} vs {}", px, recovered[0]);
        prop_assert!((py - recovered[1]).abs() < 1e-3, "Y mismatch: {} vs {}", py, recovered[1]);
        prop_assert!((pz - recovered[2]).abs() < 1e-3, "Z mismatch: {} vs {}", pz, recovered[2]);
    }

    #[test]
    fn test_center_voxel_is_physical_origin(
        nx in 1usize..30, ny in 1usize..30, nz in 1usize..30,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0
    ) {
        let device = Default::default();
        let image = Image::new(Tensor::<Backend, D>::zeros([nx, ny, nz], &device), Spacing::<D>::new([sx, sy, sz]));
        let index = host(image.physical_to_index_tensor(points([0.0, 0.0, 0.0])));
        prop_assert!((index[0] - (nx as f64 - 1.0) / 2.0).abs() < 1e-5);
        prop_assert!((index[1] - (ny as f64 - 1.0) / 2.0).abs() < 1e-5);
        prop_assert!((index[2] - (nz as f64 - 1.0) / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_affine_inverse_roundtrip(
        a in -1.0f64..1.0, b in -1.0f64..1.0, c in -1.0f64..1.0,
        tx in -10.0f64..10.0, ty in -10.0f64..10.0, tz in -10.0f64..10.0,
        px in -20.0f64..20.0, py in -20.0f64..20.0, pz in -20.0f64..20.0
    ) {
        // Diagonally dominant, therefore invertible.
        let linear = DMatrix::from_row_slice(3, 3, &[
            3.0, a, b,
            c, 3.0, a,
            b, c, 3.0,
        ]);
        let affine = AffineTransform::<D>::from_parts(&linear, &DVector::from_vec(vec![tx, ty, tz])).unwrap();
        let inverse = affine.inverse().unwrap();

        let forward = Transform::<Backend, D>::transform_points(&affine, points([px, py, pz]));
        let back = host(Transform::<Backend, D>::transform_points(&inverse, forward));

        prop_assert!((px - back[0]).abs() < 1e-2);
        prop_assert!((py - back[1]).abs() < 1e-2);
        prop_assert!((pz - back[2]).abs() < 1e-2);
    }
}
