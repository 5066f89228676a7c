//! Coefficient shrinkage: hard thresholding and empirical Wiener filtering.
//!
//! Both kernels operate on a group spectrum produced by the 3D DCT, fold the
//! 1/4096 round-trip compensation into the surviving coefficients, and
//! return the group's adaptive aggregation weight: the reciprocal of the
//! retained-coefficient count for the hard stage, the reciprocal of the
//! summed squared Wiener gains for the final stage. The DC coefficient is
//! exempt from attenuation in both.

use crate::float_trait::Bm3dFloat;
use crate::grouping::PatchCube;
use crate::transforms::{dct3d_forward, dct3d_inverse};

/// Compensation for the 3D DCT round-trip inflation.
const INVERSE_SCALE: f64 = 1.0 / 4096.0;

/// Hard-threshold a group spectrum in place against a spectral-domain
/// threshold. Coefficients below the threshold in magnitude are zeroed, the
/// rest are rescaled by 1/4096. The DC coefficient always survives.
///
/// Returns the adaptive weight `1 / retained`.
pub fn hard_threshold<F: Bm3dFloat>(cube: &mut PatchCube<F>, threshold: F) -> F {
    let scale = F::from_f64_c(INVERSE_SCALE);
    let mut retained = 0usize;

    for (i, row) in cube.iter_mut().enumerate() {
        for (lane, v) in row.iter_mut().enumerate() {
            let thr = if i == 0 && lane == 0 {
                F::zero()
            } else {
                threshold
            };
            if v.abs() >= thr {
                *v = *v * scale;
                retained += 1;
            } else {
                *v = F::zero();
            }
        }
    }

    F::one() / F::usize_as(retained)
}

/// Empirical Wiener filtering of a group spectrum in place, guided by the
/// spectrum of the basic estimate. Each coefficient is attenuated by
/// `a = r^2 / (r^2 + sigma^2)` (and rescaled by 1/4096); the DC coefficient
/// uses `a = 1`, as does any coefficient with a vanishing denominator so
/// that a zero `sigma` leaves the group untouched.
///
/// Returns the adaptive weight `1 / sum(a^2)`.
pub fn wiener_shrink<F: Bm3dFloat>(
    cube: &mut PatchCube<F>,
    reference: &PatchCube<F>,
    sigma: F,
) -> F {
    let scale = F::from_f64_c(INVERSE_SCALE);
    let sigma_sq = sigma * sigma;
    let mut norm = F::zero();

    for (i, (row, ref_row)) in cube.iter_mut().zip(reference.iter()).enumerate() {
        for (lane, (v, &r)) in row.iter_mut().zip(ref_row.iter()).enumerate() {
            let ref_sq = r * r;
            let denom = ref_sq + sigma_sq;
            let mut coeff = if denom > F::zero() {
                ref_sq / denom
            } else {
                F::one()
            };
            if i == 0 && lane == 0 {
                coeff = F::one();
            }
            norm += coeff * coeff;
            *v = *v * scale * coeff;
        }
    }

    F::one() / norm
}

/// Collaborative hard thresholding: 3D DCT, hard shrinkage, inverse 3D DCT.
/// `sigma` is compared directly against the spectral coefficients, matching
/// the transform's scaling convention.
pub fn collaborative_hard<F: Bm3dFloat>(cube: &mut PatchCube<F>, sigma: F) -> F {
    dct3d_forward(cube);
    let weight = hard_threshold(cube, sigma);
    dct3d_inverse(cube);
    weight
}

/// Collaborative Wiener filtering: transforms both the noisy group and the
/// basic-estimate group, shrinks the noisy spectrum against the reference
/// spectrum, and inverts the noisy group. The reference cube is left in the
/// spectral domain.
pub fn collaborative_wiener<F: Bm3dFloat>(
    cube: &mut PatchCube<F>,
    basic: &mut PatchCube<F>,
    sigma: F,
) -> F {
    dct3d_forward(cube);
    dct3d_forward(basic);
    let weight = wiener_shrink(cube, basic, sigma);
    dct3d_inverse(cube);
    weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{GROUP_SIZE, PATCH_SIZE};

    // Helper: Simple Linear Congruential Generator for deterministic
    // "random" test data
    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            // LCG parameters from Numerical Recipes
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            self.state
        }

        fn next_f64(&mut self) -> f64 {
            let u = self.next_u64();
            ((u >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        }
    }

    fn random_cube(seed: u64) -> PatchCube<f64> {
        let mut rng = SimpleLcg::new(seed);
        let mut cube = [[0.0f64; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
        for row in cube.iter_mut() {
            for v in row.iter_mut() {
                *v = rng.next_f64();
            }
        }
        cube
    }

    fn cube_mean(cube: &PatchCube<f64>) -> f64 {
        cube.iter().flatten().sum::<f64>() / 512.0
    }

    // ==================== Hard Threshold Tests ====================

    #[test]
    fn test_hard_threshold_zero_keeps_everything() {
        let mut cube = random_cube(1);
        let original = cube;

        let weight = hard_threshold(&mut cube, 0.0);

        assert_eq!(weight, 1.0 / 512.0, "all 512 coefficients retained");
        for i in 0..64 {
            for lane in 0..8 {
                assert_eq!(cube[i][lane], original[i][lane] / 4096.0);
            }
        }
    }

    #[test]
    fn test_hard_threshold_huge_keeps_only_dc() {
        let mut cube = random_cube(2);
        let dc = cube[0][0];

        let weight = hard_threshold(&mut cube, 1e12);

        assert_eq!(weight, 1.0, "only the DC coefficient retained");
        assert_eq!(cube[0][0], dc / 4096.0);
        for i in 0..64 {
            for lane in 0..8 {
                if i == 0 && lane == 0 {
                    continue;
                }
                assert_eq!(cube[i][lane], 0.0);
            }
        }
    }

    #[test]
    fn test_hard_threshold_dc_survives_even_when_small() {
        let mut cube = random_cube(3);
        cube[0][0] = 1e-9;

        hard_threshold(&mut cube, 1.0);

        assert!(
            cube[0][0] != 0.0,
            "DC must never be zeroed regardless of magnitude"
        );
    }

    #[test]
    fn test_hard_threshold_counts_survivors() {
        let mut cube = [[0.0f64; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
        cube[0][0] = 5.0;
        cube[3][4] = 2.0;
        cube[10][7] = -3.0;
        cube[20][1] = 0.5; // below threshold

        let weight = hard_threshold(&mut cube, 1.0);

        assert_eq!(weight, 1.0 / 3.0);
        assert_eq!(cube[20][1], 0.0);
        assert_eq!(cube[10][7], -3.0 / 4096.0);
    }

    #[test]
    fn test_collaborative_hard_zero_sigma_is_identity() {
        let original = random_cube(4);
        let mut cube = original;

        let weight = collaborative_hard(&mut cube, 0.0);

        assert_eq!(weight, 1.0 / 512.0);
        for i in 0..64 {
            for lane in 0..8 {
                assert!(
                    (cube[i][lane] - original[i][lane]).abs() < 1e-12,
                    "zero sigma must reproduce the input at [{}][{}]",
                    i,
                    lane
                );
            }
        }
    }

    #[test]
    fn test_collaborative_hard_large_sigma_yields_group_mean() {
        let original = random_cube(5);
        let mean = cube_mean(&original);
        let mut cube = original;

        let weight = collaborative_hard(&mut cube, 1e9);

        assert_eq!(weight, 1.0);
        for i in 0..64 {
            for lane in 0..8 {
                assert!(
                    (cube[i][lane] - mean).abs() < 1e-9,
                    "DC-only reconstruction should equal the group mean: got {}, mean {}",
                    cube[i][lane],
                    mean
                );
            }
        }
    }

    // ==================== Wiener Tests ====================

    #[test]
    fn test_wiener_zero_sigma_passes_through() {
        let mut cube = random_cube(6);
        let reference = cube;
        let original = cube;

        let weight = wiener_shrink(&mut cube, &reference, 0.0);

        assert!((weight - 1.0 / 512.0).abs() < 1e-12);
        for i in 0..64 {
            for lane in 0..8 {
                assert!(
                    (cube[i][lane] - original[i][lane] / 4096.0).abs() < 1e-15,
                    "zero sigma must only apply the 1/4096 scale"
                );
            }
        }
    }

    #[test]
    fn test_wiener_zero_reference_keeps_only_dc() {
        let mut cube = random_cube(7);
        let dc = cube[0][0];
        let reference = [[0.0f64; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];

        let weight = wiener_shrink(&mut cube, &reference, 2.0);

        // a = 0 everywhere except the protected DC
        assert_eq!(weight, 1.0);
        assert_eq!(cube[0][0], dc / 4096.0);
        for i in 0..64 {
            for lane in 0..8 {
                if i == 0 && lane == 0 {
                    continue;
                }
                assert_eq!(cube[i][lane], 0.0);
            }
        }
    }

    #[test]
    fn test_wiener_gain_grows_with_reference_energy() {
        // stronger reference coefficients are attenuated less
        let mut weak = [[0.0f64; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
        let mut strong = weak;
        weak[5][3] = 1.0;
        strong[5][3] = 1.0;
        let mut ref_weak = [[0.0f64; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
        let mut ref_strong = ref_weak;
        ref_weak[5][3] = 0.5;
        ref_strong[5][3] = 50.0;

        wiener_shrink(&mut weak, &ref_weak, 1.0);
        wiener_shrink(&mut strong, &ref_strong, 1.0);

        assert!(
            strong[5][3] > weak[5][3],
            "coefficient backed by a strong reference should survive better"
        );
    }

    #[test]
    fn test_collaborative_wiener_zero_sigma_is_identity() {
        let original = random_cube(8);
        let mut cube = original;
        let mut basic = original;

        collaborative_wiener(&mut cube, &mut basic, 0.0);

        for i in 0..64 {
            for lane in 0..8 {
                assert!(
                    (cube[i][lane] - original[i][lane]).abs() < 1e-11,
                    "zero sigma final pass must reproduce the input at [{}][{}]",
                    i,
                    lane
                );
            }
        }
    }

    #[test]
    fn test_collaborative_wiener_constant_basic_flattens_noise() {
        // basic estimate is the flat truth: every non-DC gain collapses and
        // the output approaches the group mean
        let original = random_cube(9);
        let mean = cube_mean(&original);
        let mut cube = original;
        let mut basic = [[mean; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];

        collaborative_wiener(&mut cube, &mut basic, 0.1);

        for i in 0..64 {
            for lane in 0..8 {
                assert!(
                    (cube[i][lane] - mean).abs() < 0.05,
                    "flat reference should pull coefficients toward the mean"
                );
            }
        }
    }

    #[test]
    fn test_adaptive_weight_increases_with_sparsity() {
        let cube = random_cube(10);

        let mut lightly = cube;
        let w_light = collaborative_hard(&mut lightly, 1.0);
        let mut heavily = cube;
        let w_heavy = collaborative_hard(&mut heavily, 50.0);

        assert!(
            w_heavy >= w_light,
            "sparser groups aggregate with larger weight: {} vs {}",
            w_heavy,
            w_light
        );
    }
}
