//! High-level runners around the per-frame drivers.
//!
//! This module owns parameter validation and the collaborator duties the
//! core deliberately leaves out: chaining the two BM3D passes (hard
//! threshold, then Wiener guided by the basic estimate), dispatching
//! independent frames of a sequence in parallel, and summing the per-frame
//! accumulation slabs of overlapping temporal windows before the final
//! division.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::float_trait::Bm3dFloat;
use crate::grouping::{AccumBuffer, PATCH_SIZE};
use crate::pipeline::{bm3d_frame, vbm3d_frame};

// =============================================================================
// Constants
// =============================================================================

/// Default per-channel noise standard deviation.
const DEFAULT_SIGMA: f64 = 0.05;

/// Default anchor stride between reference patches.
const DEFAULT_BLOCK_STEP: usize = 8;

/// Default half-side of the exhaustive spatial search window.
const DEFAULT_BM_RANGE: usize = 9;

/// Default temporal half-window (0 = spatial-only).
const DEFAULT_RADIUS: usize = 0;

/// Default number of predictive-search seeds carried between frames.
const DEFAULT_PS_NUM: usize = 2;

/// Default half-side of each predictive per-frame search.
const DEFAULT_PS_RANGE: usize = 4;

// =============================================================================
// Configuration
// =============================================================================

/// Parameters for a denoising run.
///
/// Use `Default::default()` for standard settings. With `chroma`, three
/// coregistered planes are processed per frame sharing one set of matched
/// coordinates; otherwise a single plane is processed and only `sigma[0]`
/// is consulted.
#[derive(Debug, Clone)]
pub struct Bm3dConfig<F: Bm3dFloat> {
    /// Noise standard deviation per channel. A channel with sigma below
    /// epsilon is skipped in chroma mode.
    pub sigma: [F; 3],
    /// Anchor stride, 1..=8. Smaller means more overlap and more cost.
    pub block_step: usize,
    /// Half-side of the spatial search window.
    pub bm_range: usize,
    /// Temporal half-window; 0 disables V-BM3D.
    pub radius: usize,
    /// Predictive-search seed count, 1..=8. Ignored when `radius` is 0.
    pub ps_num: usize,
    /// Predictive-search per-frame half-side. Ignored when `radius` is 0.
    pub ps_range: usize,
    /// Process three planes together instead of a single plane.
    pub chroma: bool,
}

impl<F: Bm3dFloat> Default for Bm3dConfig<F> {
    fn default() -> Self {
        Self {
            sigma: [F::from_f64_c(DEFAULT_SIGMA); 3],
            block_step: DEFAULT_BLOCK_STEP,
            bm_range: DEFAULT_BM_RANGE,
            radius: DEFAULT_RADIUS,
            ps_num: DEFAULT_PS_NUM,
            ps_range: DEFAULT_PS_RANGE,
            chroma: false,
        }
    }
}

impl<F: Bm3dFloat> Bm3dConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of planes processed per frame.
    pub fn channels(&self) -> usize {
        if self.chroma {
            3
        } else {
            1
        }
    }

    fn active_sigma(&self) -> &[F] {
        &self.sigma[..self.channels()]
    }

    /// Validate the parameters against a plane geometry.
    pub fn validate(&self, height: usize, width: usize) -> Result<(), String> {
        if height < PATCH_SIZE || width < PATCH_SIZE {
            return Err(format!(
                "plane must be at least {0}x{0}, got {1}x{2}",
                PATCH_SIZE, height, width
            ));
        }
        if self.block_step == 0 || self.block_step > PATCH_SIZE {
            return Err(format!(
                "block_step must be in 1..={}, got {}",
                PATCH_SIZE, self.block_step
            ));
        }
        if self.bm_range == 0 {
            return Err("bm_range must be > 0".to_string());
        }
        for (i, &s) in self.active_sigma().iter().enumerate() {
            if s < F::zero() {
                return Err(format!("sigma[{}] must be >= 0, got {:?}", i, s));
            }
        }
        if self.radius > 0 {
            if self.ps_num == 0 || self.ps_num > PATCH_SIZE {
                return Err(format!(
                    "ps_num must be in 1..={}, got {}",
                    PATCH_SIZE, self.ps_num
                ));
            }
            if self.ps_range == 0 {
                return Err("ps_range must be > 0".to_string());
            }
        }
        Ok(())
    }
}

fn check_planes<F: Bm3dFloat>(
    planes: &[Array2<F>],
    config: &Bm3dConfig<F>,
) -> Result<(usize, usize), String> {
    if planes.len() != config.channels() {
        return Err(format!(
            "expected {} plane(s), got {}",
            config.channels(),
            planes.len()
        ));
    }
    let (height, width) = planes[0].dim();
    for p in planes.iter().skip(1) {
        if p.dim() != (height, width) {
            return Err(format!(
                "plane geometry mismatch: {:?} vs {:?}",
                (height, width),
                p.dim()
            ));
        }
    }
    config.validate(height, width)?;
    Ok((height, width))
}

// =============================================================================
// Spatial runners
// =============================================================================

/// Run the basic (hard-thresholding) pass on one frame's planes.
pub fn bm3d_basic<F: Bm3dFloat>(
    src: &[Array2<F>],
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    run_spatial(src, None, config)
}

/// Run the final (Wiener) pass on one frame's planes, guided by the basic
/// estimate produced by [`bm3d_basic`].
pub fn bm3d_final<F: Bm3dFloat>(
    src: &[Array2<F>],
    basic: &[Array2<F>],
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    if basic.len() != src.len() {
        return Err(format!(
            "basic estimate has {} plane(s), source has {}",
            basic.len(),
            src.len()
        ));
    }
    run_spatial(src, Some(basic), config)
}

/// Full two-pass BM3D on one frame's planes: hard threshold, then Wiener
/// guided by the intermediate estimate.
pub fn bm3d_denoise<F: Bm3dFloat>(
    src: &[Array2<F>],
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    let basic = bm3d_basic(src, config)?;
    bm3d_final(src, &basic, config)
}

fn run_spatial<F: Bm3dFloat>(
    src: &[Array2<F>],
    basic: Option<&[Array2<F>]>,
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    let (height, width) = check_planes(src, config)?;

    let mut dst: Vec<Array2<F>> = (0..src.len())
        .map(|_| Array2::zeros((height, width)))
        .collect();
    let mut scratch: Vec<AccumBuffer<F>> = (0..src.len())
        .map(|_| AccumBuffer::new(height, width))
        .collect();

    let src_views: Vec<ArrayView2<F>> = src.iter().map(|p| p.view()).collect();
    let basic_views: Option<Vec<ArrayView2<F>>> =
        basic.map(|b| b.iter().map(|p| p.view()).collect());
    {
        let mut dst_views: Vec<_> = dst.iter_mut().map(|p| p.view_mut()).collect();
        bm3d_frame(
            &mut dst_views,
            &src_views,
            basic_views.as_deref(),
            config.active_sigma(),
            config.block_step,
            config.bm_range,
            config.chroma,
            &mut scratch,
        );
    }
    Ok(dst)
}

/// Two-pass denoising of a sequence of independent single-plane frames,
/// dispatched in parallel with one worker and private scratch per frame.
pub fn bm3d_sequence<F: Bm3dFloat>(
    frames: &[Array2<F>],
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    if config.chroma {
        return Err("sequence runners operate on a single plane per frame".to_string());
    }
    if frames.is_empty() {
        return Err("empty frame sequence".to_string());
    }
    frames
        .par_iter()
        .map(|frame| {
            let planes = std::slice::from_ref(frame);
            let out = bm3d_denoise(planes, config)?;
            Ok(out.into_iter().next().unwrap())
        })
        .collect()
}

// =============================================================================
// Temporal runner
// =============================================================================

/// V-BM3D over a sequence of single-plane frames.
///
/// Every frame is processed with a temporal window of `2 * radius + 1`
/// neighbors (indices clamped at the sequence borders), producing one
/// accumulation slab per window position. An output frame `f` then combines
/// slab `f - g + radius` of every contributing frame `g` in
/// `[f - radius, f + radius]` before the aggregation division, so each
/// pixel averages over all groups of all windows that touched it.
///
/// `basic` selects the final (Wiener) stage, with one basic-estimate plane
/// per frame.
pub fn vbm3d_sequence<F: Bm3dFloat>(
    frames: &[Array2<F>],
    basic: Option<&[Array2<F>]>,
    config: &Bm3dConfig<F>,
) -> Result<Vec<Array2<F>>, String> {
    if config.chroma {
        return Err("sequence runners operate on a single plane per frame".to_string());
    }
    if frames.is_empty() {
        return Err("empty frame sequence".to_string());
    }
    if let Some(b) = basic {
        if b.len() != frames.len() {
            return Err(format!(
                "basic estimate has {} frame(s), source has {}",
                b.len(),
                frames.len()
            ));
        }
    }
    let (height, width) = frames[0].dim();
    for f in frames.iter().skip(1) {
        if f.dim() != (height, width) {
            return Err(format!(
                "frame geometry mismatch: {:?} vs {:?}",
                (height, width),
                f.dim()
            ));
        }
    }
    config.validate(height, width)?;

    let radius = config.radius;
    let temporal_width = 2 * radius + 1;
    let last = frames.len() - 1;
    let clamp = |i: isize| -> usize { i.clamp(0, last as isize) as usize };

    let stacks: Vec<Vec<AccumBuffer<F>>> = (0..frames.len())
        .into_par_iter()
        .map(|f| {
            let mut accum: Vec<AccumBuffer<F>> = (0..temporal_width)
                .map(|_| AccumBuffer::new(height, width))
                .collect();

            let window: Vec<ArrayView2<F>> = (-(radius as isize)..=radius as isize)
                .map(|dt| frames[clamp(f as isize + dt)].view())
                .collect();
            let basic_window: Option<Vec<ArrayView2<F>>> = basic.map(|b| {
                (-(radius as isize)..=radius as isize)
                    .map(|dt| b[clamp(f as isize + dt)].view())
                    .collect()
            });

            vbm3d_frame(
                &mut accum,
                &window,
                basic_window.as_deref(),
                config.active_sigma(),
                config.block_step,
                config.bm_range,
                radius,
                config.ps_num,
                config.ps_range,
                false,
            );
            accum
        })
        .collect();

    let mut outputs = Vec::with_capacity(frames.len());
    for f in 0..frames.len() {
        let mut merged = AccumBuffer::<F>::new(height, width);
        let lo = f.saturating_sub(radius);
        let hi = (f + radius).min(last);
        for g in lo..=hi {
            merged.merge(&stacks[g][f + radius - g]);
        }

        let mut out = Array2::zeros((height, width));
        merged.aggregate_into(&mut out.view_mut());
        outputs.push(out);
    }
    Ok(outputs)
}
