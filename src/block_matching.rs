//! Block matching: 8-slot match sets, spatial exhaustive search, and
//! temporal predictive search.
//!
//! A match set records the 8 best candidates seen so far for one reference
//! patch, sorted by squared distance in decreasing order: slot 0 holds the
//! worst surviving match and slot 7 the best. Insertion is a sorted shift
//! rather than a sort, so the ordering invariant holds after every candidate.

use ndarray::ArrayView2;

use crate::float_trait::Bm3dFloat;
use crate::grouping::{Patch, GROUP_SIZE, PATCH_SIZE};

/// Eight-slot record of the best matches for one reference patch.
///
/// `errors` is non-increasing from slot 0 to slot 7. `frames` carries the
/// temporal plane index of each entry and is ignored by purely spatial
/// matching.
#[derive(Debug, Clone)]
pub struct MatchSet<F: Bm3dFloat> {
    pub errors: [F; GROUP_SIZE],
    pub rows: [usize; GROUP_SIZE],
    pub cols: [usize; GROUP_SIZE],
    pub frames: [usize; GROUP_SIZE],
}

impl<F: Bm3dFloat> MatchSet<F> {
    /// Empty set: all errors at +infinity-like max, coordinates zeroed.
    pub fn new() -> Self {
        Self {
            errors: [F::max_value(); GROUP_SIZE],
            rows: [0; GROUP_SIZE],
            cols: [0; GROUP_SIZE],
            frames: [0; GROUP_SIZE],
        }
    }

    /// Offer a candidate. If `error` strictly beats `k` slots (always the
    /// worst-valued prefix), slots 1..k-1 shift one position toward slot 0
    /// (dropping slot 0, the current worst) and the candidate lands at slot
    /// k-1. Ties never displace.
    pub fn consider(&mut self, error: F, row: usize, col: usize, frame: usize) {
        let k = self.errors.iter().filter(|&&e| error < e).count();
        if k == 0 {
            return;
        }
        for i in 0..k - 1 {
            self.errors[i] = self.errors[i + 1];
            self.rows[i] = self.rows[i + 1];
            self.cols[i] = self.cols[i + 1];
            self.frames[i] = self.frames[i + 1];
        }
        self.errors[k - 1] = error;
        self.rows[k - 1] = row;
        self.cols[k - 1] = col;
        self.frames[k - 1] = frame;
    }

    /// The `i`-th best entry (rank 0 = slot 7) as (error, row, col).
    pub fn rank(&self, i: usize) -> (F, usize, usize) {
        let slot = GROUP_SIZE - 1 - i;
        (self.errors[slot], self.rows[slot], self.cols[slot])
    }

    /// Force the reference anchor into the set: if (`row`, `col`) is absent,
    /// its coordinates overwrite slot 0 (the worst match). Errors are left
    /// untouched; only coordinates participate in group assembly.
    pub fn insert_if_absent(&mut self, row: usize, col: usize) {
        let present = self
            .rows
            .iter()
            .zip(self.cols.iter())
            .any(|(&r, &c)| r == row && c == col);
        if !present {
            self.rows[0] = row;
            self.cols[0] = col;
        }
    }

    /// Temporal variant of [`MatchSet::insert_if_absent`], keyed on the full
    /// (row, col, frame) tuple.
    pub fn insert_if_absent_temporal(&mut self, row: usize, col: usize, frame: usize) {
        let present = (0..GROUP_SIZE)
            .any(|i| self.rows[i] == row && self.cols[i] == col && self.frames[i] == frame);
        if !present {
            self.rows[0] = row;
            self.cols[0] = col;
            self.frames[0] = frame;
        }
    }
}

impl<F: Bm3dFloat> Default for MatchSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum of squared differences over the 64 pixels of a patch pair.
#[inline]
fn patch_distance<F: Bm3dFloat>(
    reference: &Patch<F>,
    plane: ArrayView2<F>,
    row: usize,
    col: usize,
) -> F {
    let mut sum = F::zero();
    for (j, ref_row) in reference.iter().enumerate() {
        for (i, &r) in ref_row.iter().enumerate() {
            let diff = r - plane[[row + j, col + i]];
            sum += diff * diff;
        }
    }
    sum
}

/// Exhaustive spatial search: offer every candidate anchor within
/// `bm_range` of (`row`, `col`) to the match set, in row-major order.
/// Candidates are clamped so patches stay inside the plane. The set is
/// mutated cumulatively, so repeated calls merge their results.
pub fn match_patches<F: Bm3dFloat>(
    set: &mut MatchSet<F>,
    reference: &Patch<F>,
    plane: ArrayView2<F>,
    bm_range: usize,
    row: usize,
    col: usize,
) {
    let (height, width) = plane.dim();
    let top = row.saturating_sub(bm_range);
    let bottom = (row + bm_range).min(height - PATCH_SIZE);
    let left = col.saturating_sub(bm_range);
    let right = (col + bm_range).min(width - PATCH_SIZE);

    for r in top..=bottom {
        for c in left..=right {
            let error = patch_distance(reference, plane, r, c);
            set.consider(error, r, c, 0);
        }
    }
}

/// Temporal search over a stack of `2 * radius + 1` coregistered planes.
///
/// The center plane is searched exhaustively. Each neighboring plane is then
/// searched predictively, walking outward one plane at a time: `ps_num`
/// narrow searches of half-side `ps_range`, seeded at the best coordinates
/// found in the previous plane (the center result seeds the first hop in
/// each direction). The `ps_num` best per-plane entries are merged into the
/// global set tagged with their plane index.
#[allow(clippy::too_many_arguments)]
pub fn match_patches_temporal<F: Bm3dFloat>(
    set: &mut MatchSet<F>,
    reference: &Patch<F>,
    planes: &[ArrayView2<F>],
    bm_range: usize,
    ps_num: usize,
    ps_range: usize,
    row: usize,
    col: usize,
) {
    let radius = planes.len() / 2;
    let center = radius;

    match_patches(set, reference, planes[center], bm_range, row, col);
    set.frames = [center; GROUP_SIZE];

    let center_seeds: Vec<(usize, usize)> = (0..GROUP_SIZE)
        .map(|i| {
            let (_, r, c) = set.rank(i);
            (r, c)
        })
        .collect();

    for direction in [-1isize, 1] {
        let mut last_seeds = center_seeds.clone();
        for t in 1..=radius {
            let z = (center as isize + direction * t as isize) as usize;

            let mut frame_set = MatchSet::new();
            for &(seed_row, seed_col) in last_seeds.iter().take(ps_num) {
                match_patches(
                    &mut frame_set,
                    reference,
                    planes[z],
                    ps_range,
                    seed_row,
                    seed_col,
                );
            }

            for i in 0..ps_num {
                let (error, r, c) = frame_set.rank(i);
                set.consider(error, r, c, z);
            }

            last_seeds = (0..GROUP_SIZE)
                .map(|i| {
                    let (_, r, c) = frame_set.rank(i);
                    (r, c)
                })
                .collect();
        }
    }
}
