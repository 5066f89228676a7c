//! BM3D / V-BM3D Denoising Core
//!
//! Pure Rust implementation of the BM3D (Block-Matching and 3D filtering)
//! image denoiser and its temporal extension V-BM3D, operating on
//! floating-point image planes. The core pass groups self-similar 8x8
//! patches, transforms each group with a separable 3D DCT, attenuates
//! noise-dominated coefficients by hard thresholding or empirical Wiener
//! filtering, and aggregates the overlapping estimates with per-group
//! adaptive weights.
//!
//! ## f32/f64 Support
//!
//! The library supports both f32 and f64 precision through the `Bm3dFloat`
//! trait. All public functions are generic over this trait.
//!
//! ## Layering
//!
//! The per-frame kernels in `pipeline` are single-threaded pure compute
//! over borrowed planes. The runners in `orchestration` add parameter
//! validation, the two-pass basic/final chain, and parallel dispatch of
//! independent frames.

pub mod block_matching;
pub mod filtering;
pub mod float_trait;
pub mod grouping;
pub mod orchestration;
pub mod pipeline;
pub mod transforms;

// Re-export commonly used types at the crate root
pub use block_matching::{match_patches, match_patches_temporal, MatchSet};
pub use filtering::{collaborative_hard, collaborative_wiener, hard_threshold, wiener_shrink};
pub use float_trait::Bm3dFloat;
pub use grouping::{AccumBuffer, Patch, PatchCube, GROUP_SIZE, PATCH_SIZE};
pub use orchestration::{
    bm3d_basic, bm3d_denoise, bm3d_final, bm3d_sequence, vbm3d_sequence, Bm3dConfig,
};
pub use pipeline::{bm3d_frame, vbm3d_frame};
pub use transforms::{dct3d_forward, dct3d_inverse, dct8_forward, dct8_inverse, transpose8};
