//! Per-frame denoising drivers.
//!
//! The drivers walk reference-patch anchors over the plane with stride
//! `block_step`, clamping the last row/column of anchors so the plane
//! borders are always covered, and run match -> group -> collaborative
//! filter -> scatter-add for every anchor. The spatial driver finishes with
//! the aggregation division; the temporal driver leaves its per-frame
//! accumulation slabs to be combined across overlapping windows by the
//! caller (see `orchestration`).

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::block_matching::{match_patches, match_patches_temporal, MatchSet};
use crate::filtering::{collaborative_hard, collaborative_wiener};
use crate::float_trait::Bm3dFloat;
use crate::grouping::{
    accumulate_group, accumulate_group_temporal, load_group, load_group_temporal, load_patch,
    AccumBuffer, PATCH_SIZE,
};

/// Visit every anchor of the overlapping tiling: multiples of `block_step`,
/// with the final row/column clamped to `height - 8` / `width - 8` so the
/// right and bottom borders are covered even when the step does not divide
/// the plane size.
fn for_each_anchor(height: usize, width: usize, block_step: usize, mut visit: impl FnMut(usize, usize)) {
    let mut row_raw = 0;
    while row_raw < height - PATCH_SIZE + block_step {
        let row = row_raw.min(height - PATCH_SIZE);
        let mut col_raw = 0;
        while col_raw < width - PATCH_SIZE + block_step {
            let col = col_raw.min(width - PATCH_SIZE);
            visit(row, col);
            col_raw += block_step;
        }
        row_raw += block_step;
    }
}

/// Single-frame (spatial) BM3D pass over one or three coregistered planes.
///
/// Matching runs on the first plane (the basic estimate when `basic` is
/// given, the noisy source otherwise) and the resulting coordinates are
/// shared by all channels. `basic` selects the final (Wiener) stage; without
/// it the hard-thresholding stage runs. With `chroma`, channels whose sigma
/// is below epsilon are skipped entirely.
///
/// `scratch` provides one accumulation buffer pair per channel; it is
/// zeroed on entry and holds the raw `wdst`/`weight` planes on return.
/// Geometry must satisfy `width >= 8`, `height >= 8`.
#[allow(clippy::too_many_arguments)]
pub fn bm3d_frame<'a, F: Bm3dFloat>(
    dst: &mut [ArrayViewMut2<'_, F>],
    src: &[ArrayView2<'a, F>],
    basic: Option<&[ArrayView2<'a, F>]>,
    sigma: &[F],
    block_step: usize,
    bm_range: usize,
    chroma: bool,
    scratch: &mut [AccumBuffer<F>],
) {
    let (height, width) = src[0].dim();
    let channels = src.len();
    let match_plane = basic.map_or(src[0], |b| b[0]);

    for buffer in scratch.iter_mut() {
        buffer.reset();
    }

    for_each_anchor(height, width, block_step, |row, col| {
        let reference = load_patch(match_plane, row, col);
        let mut set = MatchSet::new();
        match_patches(&mut set, &reference, match_plane, bm_range, row, col);
        set.insert_if_absent(row, col);

        for channel in 0..channels {
            if chroma && sigma[channel] < F::epsilon() {
                continue;
            }

            let mut cube = load_group(src[channel], &set.rows, &set.cols);
            let weight = match basic {
                Some(b) => {
                    let mut basic_cube = load_group(b[channel], &set.rows, &set.cols);
                    collaborative_wiener(&mut cube, &mut basic_cube, sigma[channel])
                }
                None => collaborative_hard(&mut cube, sigma[channel]),
            };
            accumulate_group(&mut scratch[channel], &cube, &set.rows, &set.cols, weight);
        }
    });

    for channel in 0..channels {
        if chroma && sigma[channel] < F::epsilon() {
            continue;
        }
        scratch[channel].aggregate_into(&mut dst[channel]);
    }
}

/// Single-frame V-BM3D pass over a temporal window of `2 * radius + 1`
/// coregistered planes per channel (`src` is channel-major, frame-minor).
///
/// Matching runs temporally on the first channel's window. Contributions
/// are scatter-added into `accum`, one buffer pair per (channel, frame)
/// slab in the same channel-major order, zeroed on entry. No aggregation is
/// performed here: slabs of overlapping windows must be summed and divided
/// by the caller once all contributing frames have been processed.
#[allow(clippy::too_many_arguments)]
pub fn vbm3d_frame<'a, F: Bm3dFloat>(
    accum: &mut [AccumBuffer<F>],
    src: &[ArrayView2<'a, F>],
    basic: Option<&[ArrayView2<'a, F>]>,
    sigma: &[F],
    block_step: usize,
    bm_range: usize,
    radius: usize,
    ps_num: usize,
    ps_range: usize,
    chroma: bool,
) {
    let temporal_width = 2 * radius + 1;
    let center = radius;
    let channels = src.len() / temporal_width;
    let (height, width) = src[0].dim();
    let match_planes = basic.map_or(&src[..temporal_width], |b| &b[..temporal_width]);

    for buffer in accum.iter_mut() {
        buffer.reset();
    }

    for_each_anchor(height, width, block_step, |row, col| {
        let reference = load_patch(match_planes[center], row, col);
        let mut set = MatchSet::new();
        match_patches_temporal(
            &mut set,
            &reference,
            match_planes,
            bm_range,
            ps_num,
            ps_range,
            row,
            col,
        );
        set.insert_if_absent_temporal(row, col, center);

        for channel in 0..channels {
            if chroma && sigma[channel] < F::epsilon() {
                continue;
            }

            let window = &src[channel * temporal_width..(channel + 1) * temporal_width];
            let mut cube = load_group_temporal(window, &set.rows, &set.cols, &set.frames);
            let weight = match basic {
                Some(b) => {
                    let basic_window =
                        &b[channel * temporal_width..(channel + 1) * temporal_width];
                    let mut basic_cube =
                        load_group_temporal(basic_window, &set.rows, &set.cols, &set.frames);
                    collaborative_wiener(&mut cube, &mut basic_cube, sigma[channel])
                }
                None => collaborative_hard(&mut cube, sigma[channel]),
            };

            let slabs = &mut accum[channel * temporal_width..(channel + 1) * temporal_width];
            accumulate_group_temporal(slabs, &cube, &set.rows, &set.cols, &set.frames, weight);
        }
    });
}
