//! Patch gathering and weighted accumulation.
//!
//! A group is 8 matched 8x8 patches stacked into an 8x8x8 cube. The cube is
//! stored as 64 rows of 8 lanes (`[[F; 8]; 64]`): row `i * 8 + j` holds row
//! `j` of patch `i`, and the 8 lanes of a row are its 8 columns. This layout
//! is shared by the spectral transforms and the shrinkage kernels.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::float_trait::Bm3dFloat;

/// Side length of a patch; groups are PATCH_SIZE^3 cubes.
pub const PATCH_SIZE: usize = 8;

/// Number of patches per group.
pub const GROUP_SIZE: usize = 8;

/// A single 8x8 patch, row-major.
pub type Patch<F> = [[F; PATCH_SIZE]; PATCH_SIZE];

/// An 8x8x8 group of patches, 64 rows of 8 lanes.
pub type PatchCube<F> = [[F; PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];

/// Copy the 8x8 patch with top-left corner (`row`, `col`) out of a plane.
#[inline]
pub fn load_patch<F: Bm3dFloat>(plane: ArrayView2<F>, row: usize, col: usize) -> Patch<F> {
    let mut patch = [[F::zero(); PATCH_SIZE]; PATCH_SIZE];
    for (j, patch_row) in patch.iter_mut().enumerate() {
        for (i, v) in patch_row.iter_mut().enumerate() {
            *v = plane[[row + j, col + i]];
        }
    }
    patch
}

/// Gather the 8 patches at (`rows[i]`, `cols[i]`) of a single plane into a cube.
pub fn load_group<F: Bm3dFloat>(
    plane: ArrayView2<F>,
    rows: &[usize; GROUP_SIZE],
    cols: &[usize; GROUP_SIZE],
) -> PatchCube<F> {
    let mut cube = [[F::zero(); PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
    for i in 0..GROUP_SIZE {
        let patch = load_patch(plane, rows[i], cols[i]);
        cube[i * PATCH_SIZE..(i + 1) * PATCH_SIZE].copy_from_slice(&patch);
    }
    cube
}

/// Gather the 8 patches of a group across a temporal plane stack,
/// selecting the plane of each patch by `frames[i]`.
pub fn load_group_temporal<F: Bm3dFloat>(
    planes: &[ArrayView2<F>],
    rows: &[usize; GROUP_SIZE],
    cols: &[usize; GROUP_SIZE],
    frames: &[usize; GROUP_SIZE],
) -> PatchCube<F> {
    let mut cube = [[F::zero(); PATCH_SIZE]; GROUP_SIZE * PATCH_SIZE];
    for i in 0..GROUP_SIZE {
        let patch = load_patch(planes[frames[i]], rows[i], cols[i]);
        cube[i * PATCH_SIZE..(i + 1) * PATCH_SIZE].copy_from_slice(&patch);
    }
    cube
}

/// Accumulation buffer pair for overlap-add aggregation: `wdst` collects
/// weighted patch estimates, `weight` collects the matching weights.
#[derive(Debug, Clone)]
pub struct AccumBuffer<F: Bm3dFloat> {
    pub wdst: Array2<F>,
    pub weight: Array2<F>,
}

impl<F: Bm3dFloat> AccumBuffer<F> {
    /// Create a zeroed buffer pair for a `rows` x `cols` plane.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            wdst: Array2::zeros((rows, cols)),
            weight: Array2::zeros((rows, cols)),
        }
    }

    /// Reset both planes to zero.
    pub fn reset(&mut self) {
        self.wdst.fill(F::zero());
        self.weight.fill(F::zero());
    }

    /// Element-wise sum of another buffer pair into this one.
    /// Used to combine per-frame slabs of overlapping temporal windows.
    pub fn merge(&mut self, other: &AccumBuffer<F>) {
        self.wdst += &other.wdst;
        self.weight += &other.weight;
    }

    /// Finish aggregation: `dst = wdst / weight`, element-wise.
    ///
    /// Every pixel is covered by at least one group under the anchor
    /// schedule, so `weight` is positive everywhere; a zero weight here is a
    /// driver bug and produces non-finite output rather than being masked.
    pub fn aggregate_into(&self, dst: &mut ArrayViewMut2<F>) {
        dst.zip_mut_with(&self.wdst, |d, &w| *d = w);
        dst.zip_mut_with(&self.weight, |d, &w| *d = *d / w);
    }
}

/// Scatter-add a denoised cube back into an accumulation buffer: at patch
/// `i`'s origin, add `adaptive_weight * pixel` into `wdst` and
/// `adaptive_weight` into `weight` for each of its 64 pixels.
pub fn accumulate_group<F: Bm3dFloat>(
    buffer: &mut AccumBuffer<F>,
    cube: &PatchCube<F>,
    rows: &[usize; GROUP_SIZE],
    cols: &[usize; GROUP_SIZE],
    adaptive_weight: F,
) {
    for i in 0..GROUP_SIZE {
        for j in 0..PATCH_SIZE {
            let lanes = &cube[i * PATCH_SIZE + j];
            for (k, &v) in lanes.iter().enumerate() {
                let r = rows[i] + j;
                let c = cols[i] + k;
                buffer.wdst[[r, c]] += adaptive_weight * v;
                buffer.weight[[r, c]] += adaptive_weight;
            }
        }
    }
}

/// Temporal variant of [`accumulate_group`]: each patch's contribution goes
/// into the per-frame slab selected by `frames[i]`.
pub fn accumulate_group_temporal<F: Bm3dFloat>(
    slabs: &mut [AccumBuffer<F>],
    cube: &PatchCube<F>,
    rows: &[usize; GROUP_SIZE],
    cols: &[usize; GROUP_SIZE],
    frames: &[usize; GROUP_SIZE],
    adaptive_weight: F,
) {
    for i in 0..GROUP_SIZE {
        let slab = &mut slabs[frames[i]];
        for j in 0..PATCH_SIZE {
            let lanes = &cube[i * PATCH_SIZE + j];
            for (k, &v) in lanes.iter().enumerate() {
                let r = rows[i] + j;
                let c = cols[i] + k;
                slab.wdst[[r, c]] += adaptive_weight * v;
                slab.weight[[r, c]] += adaptive_weight;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn index_plane(rows: usize, cols: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32)
    }

    #[test]
    fn test_load_patch_reads_expected_window() {
        let plane = index_plane(16, 16);
        let patch = load_patch(plane.view(), 3, 5);

        for j in 0..PATCH_SIZE {
            for i in 0..PATCH_SIZE {
                assert_eq!(patch[j][i], ((3 + j) * 16 + 5 + i) as f32);
            }
        }
    }

    #[test]
    fn test_load_group_stacks_in_slot_order() {
        let plane = index_plane(24, 24);
        let rows = [0, 1, 2, 3, 4, 5, 6, 7];
        let cols = [7, 6, 5, 4, 3, 2, 1, 0];
        let cube = load_group(plane.view(), &rows, &cols);

        for i in 0..GROUP_SIZE {
            // first pixel of each patch is its (row, col) origin
            assert_eq!(cube[i * PATCH_SIZE][0], (rows[i] * 24 + cols[i]) as f32);
        }
    }

    #[test]
    fn test_load_group_temporal_selects_frames() {
        let planes: Vec<Array2<f32>> = (0..3)
            .map(|z| Array2::from_elem((16, 16), z as f32))
            .collect();
        let views: Vec<_> = planes.iter().map(|p| p.view()).collect();

        let rows = [0; 8];
        let cols = [0; 8];
        let frames = [0, 1, 2, 1, 0, 2, 1, 1];
        let cube = load_group_temporal(&views, &rows, &cols, &frames);

        for i in 0..GROUP_SIZE {
            assert_eq!(cube[i * PATCH_SIZE][0], frames[i] as f32);
        }
    }

    #[test]
    fn test_accumulate_then_aggregate_is_identity_for_single_group() {
        let plane = index_plane(16, 16);
        let rows = [0, 0, 0, 0, 8, 8, 8, 8];
        let cols = [0, 8, 0, 8, 0, 8, 0, 8];
        let cube = load_group(plane.view(), &rows, &cols);

        let mut buffer = AccumBuffer::<f32>::new(16, 16);
        accumulate_group(&mut buffer, &cube, &rows, &cols, 0.25);

        let mut dst = Array2::<f32>::zeros((16, 16));
        buffer.aggregate_into(&mut dst.view_mut());

        // every pixel of the plane is covered, duplicated slots average to
        // the same value, so aggregation reproduces the input
        for r in 0..16 {
            for c in 0..16 {
                assert_eq!(dst[[r, c]], plane[[r, c]], "mismatch at ({}, {})", r, c);
            }
        }
    }

    #[test]
    fn test_accumulate_weight_counts_coverage() {
        let plane = index_plane(16, 16);
        let rows = [0; 8];
        let cols = [0; 8];
        let cube = load_group(plane.view(), &rows, &cols);

        let mut buffer = AccumBuffer::<f32>::new(16, 16);
        accumulate_group(&mut buffer, &cube, &rows, &cols, 1.0);

        // 8 identical slots, weight 1 each
        assert_eq!(buffer.weight[[0, 0]], 8.0);
        assert_eq!(buffer.weight[[7, 7]], 8.0);
        assert_eq!(buffer.weight[[8, 8]], 0.0);
    }

    #[test]
    fn test_accumulate_temporal_routes_to_slabs() {
        let planes: Vec<Array2<f32>> = (0..3)
            .map(|z| Array2::from_elem((16, 16), z as f32 + 1.0))
            .collect();
        let views: Vec<_> = planes.iter().map(|p| p.view()).collect();

        let rows = [0; 8];
        let cols = [0; 8];
        let frames = [0, 0, 1, 1, 1, 2, 2, 2];
        let cube = load_group_temporal(&views, &rows, &cols, &frames);

        let mut slabs: Vec<AccumBuffer<f32>> =
            (0..3).map(|_| AccumBuffer::new(16, 16)).collect();
        accumulate_group_temporal(&mut slabs, &cube, &rows, &cols, &frames, 1.0);

        assert_eq!(slabs[0].weight[[0, 0]], 2.0);
        assert_eq!(slabs[1].weight[[0, 0]], 3.0);
        assert_eq!(slabs[2].weight[[0, 0]], 3.0);
        assert_eq!(slabs[0].wdst[[0, 0]], 2.0);
        assert_eq!(slabs[1].wdst[[0, 0]], 6.0);
        assert_eq!(slabs[2].wdst[[0, 0]], 9.0);
    }

    #[test]
    fn test_merge_sums_pairs() {
        let mut a = AccumBuffer::<f32>::new(4, 4);
        let mut b = AccumBuffer::<f32>::new(4, 4);
        a.wdst[[1, 1]] = 2.0;
        a.weight[[1, 1]] = 1.0;
        b.wdst[[1, 1]] = 4.0;
        b.weight[[1, 1]] = 3.0;

        a.merge(&b);
        assert_eq!(a.wdst[[1, 1]], 6.0);
        assert_eq!(a.weight[[1, 1]], 4.0);
    }

    #[test]
    fn test_reset_zeroes_both_planes() {
        let mut buffer = AccumBuffer::<f64>::new(4, 4);
        buffer.wdst.fill(1.0);
        buffer.weight.fill(2.0);
        buffer.reset();
        assert!(buffer.wdst.iter().all(|&v| v == 0.0));
        assert!(buffer.weight.iter().all(|&v| v == 0.0));
    }
}
