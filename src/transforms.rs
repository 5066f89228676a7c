//! Spectral primitives: length-8 DCT-II/III, 8x8 transpose, separable 3D DCT.
//!
//! The 1D kernels are the radix-8 real factorization generated by fftw-3.3.9
//! (`rdft/scalar/r2r/e10_8.c` and `e01_8.c`), normalized and scaled so that a
//! forward pass followed by an inverse pass returns the input multiplied by
//! 16. Over the three dimensions of a group this inflates a round trip by
//! 4096, which the shrinkage kernels compensate with a single 1/4096 factor.

use crate::float_trait::Bm3dFloat;
use crate::grouping::{PatchCube, GROUP_SIZE, PATCH_SIZE};

const KP198912367: f64 = 0.198912367379658006911597622644676228597850501;
const KP414213562: f64 = 0.414213562373095048801688724209698078569671875;
const KP668178637: f64 = 0.668178637919298919997757686523080761552472251;
const KP707106781: f64 = 0.707106781186547524400844362104849039284835938;
const KP1_414213562: f64 = 1.414213562373095048801688724209698078569671875;
const KP1_662939224: f64 = 1.662939224605090474157576755235811513477121624;
const KP1_847759065: f64 = 1.847759065022573512256366378793576573644833252;
const KP1_961570560: f64 = 1.961570560806460898252364472268478073947867462;

/// In-place length-8 DCT-II (scaled; see module docs).
pub fn dct8_forward<F: Bm3dFloat>(v: &mut [F; 8]) {
    let kp198912367 = F::from_f64_c(KP198912367);
    let kp414213562 = F::from_f64_c(KP414213562);
    let kp668178637 = F::from_f64_c(KP668178637);
    let kp707106781 = F::from_f64_c(KP707106781);
    let kp1_414213562 = F::from_f64_c(KP1_414213562);
    let kp1_662939224 = F::from_f64_c(KP1_662939224);
    let kp1_847759065 = F::from_f64_c(KP1_847759065);
    let kp1_961570560 = F::from_f64_c(KP1_961570560);

    let t1 = v[0];
    let t2 = v[7];
    let t3 = t1 - t2;
    let tj = t1 + t2;
    let tc = v[4];
    let td = v[3];
    let te = tc - td;
    let tk = tc + td;
    let t4 = v[2];
    let t5 = v[5];
    let t6 = t4 - t5;
    let t7 = v[1];
    let t8 = v[6];
    let t9 = t7 - t8;
    let ta = t6 + t9;
    let tn = t7 + t8;
    let tf = t6 - t9;
    let tm = t4 + t5;
    let tb = t3 - kp707106781 * ta;
    let tg = te - kp707106781 * tf;
    v[3] = kp1_662939224 * (kp668178637 * tg + tb);
    v[5] = -(kp1_662939224 * (tg - kp668178637 * tb));
    let tp = tj + tk;
    let tq = tm + tn;
    v[4] = kp1_414213562 * (tp - tq);
    v[0] = kp1_414213562 * (tp + tq);
    let th = t3 + kp707106781 * ta;
    let ti = te + kp707106781 * tf;
    v[1] = kp1_961570560 * (th - kp198912367 * ti);
    v[7] = kp1_961570560 * (kp198912367 * th + ti);
    let tl = tj - tk;
    let to = tm - tn;
    v[2] = kp1_847759065 * (tl - kp414213562 * to);
    v[6] = kp1_847759065 * (kp414213562 * tl + to);
}

/// In-place length-8 DCT-III, the inverse of [`dct8_forward`] up to the
/// factor 16.
pub fn dct8_inverse<F: Bm3dFloat>(v: &mut [F; 8]) {
    let kp198912367 = F::from_f64_c(KP198912367);
    let kp414213562 = F::from_f64_c(KP414213562);
    let kp668178637 = F::from_f64_c(KP668178637);
    let kp707106781 = F::from_f64_c(KP707106781);
    let kp1_414213562 = F::from_f64_c(KP1_414213562);
    let kp1_662939224 = F::from_f64_c(KP1_662939224);
    let kp1_847759065 = F::from_f64_c(KP1_847759065);
    let kp1_961570560 = F::from_f64_c(KP1_961570560);

    let t1 = kp1_414213562 * v[0];
    let t2 = v[4];
    let t3 = t1 + kp1_414213562 * t2;
    let tj = t1 - kp1_414213562 * t2;
    let t4 = v[2];
    let t5 = v[6];
    let t6 = t4 + kp414213562 * t5;
    let tk = kp414213562 * t4 - t5;
    let t8 = v[1];
    let td = v[7];
    let t9 = v[5];
    let ta = v[3];
    let tb = t9 + ta;
    let te = ta - t9;
    let tc = t8 + kp707106781 * tb;
    let tn = td - kp707106781 * te;
    let tf = td + kp707106781 * te;
    let tm = t8 - kp707106781 * tb;
    let t7 = t3 + kp1_847759065 * t6;
    let tg = tc + kp198912367 * tf;
    v[7] = t7 - kp1_961570560 * tg;
    v[0] = t7 + kp1_961570560 * tg;
    let tp = tj - kp1_847759065 * tk;
    let tq = kp668178637 * tm + tn;
    v[5] = tp - kp1_662939224 * tq;
    v[2] = tp + kp1_662939224 * tq;
    let th = t3 - kp1_847759065 * t6;
    let ti = tf - kp198912367 * tc;
    v[3] = th - kp1_961570560 * ti;
    v[4] = th + kp1_961570560 * ti;
    let tl = tj + kp1_847759065 * tk;
    let to = tm - kp668178637 * tn;
    v[6] = tl - kp1_662939224 * to;
    v[1] = tl + kp1_662939224 * to;
}

/// Transpose an 8x8 tile in place.
pub fn transpose8<F: Bm3dFloat>(tile: &mut [[F; PATCH_SIZE]]) {
    for j in 0..PATCH_SIZE {
        for i in 0..j {
            let tmp = tile[j][i];
            tile[j][i] = tile[i][j];
            tile[i][j] = tmp;
        }
    }
}

/// Apply the length-8 DCT down the rows of a tile, once per lane.
fn dct8_columns<F: Bm3dFloat>(tile: &mut [[F; PATCH_SIZE]], forward: bool) {
    for lane in 0..PATCH_SIZE {
        let mut v = [F::zero(); 8];
        for (i, row) in tile.iter().enumerate() {
            v[i] = row[lane];
        }
        if forward {
            dct8_forward(&mut v);
        } else {
            dct8_inverse(&mut v);
        }
        for (i, row) in tile.iter_mut().enumerate() {
            row[lane] = v[i];
        }
    }
}

/// Apply the length-8 DCT along the depth axis of a cube: row `j` of every
/// patch forms one length-8 sequence per lane.
fn dct8_depth<F: Bm3dFloat>(cube: &mut PatchCube<F>, forward: bool) {
    for j in 0..PATCH_SIZE {
        for lane in 0..PATCH_SIZE {
            let mut v = [F::zero(); 8];
            for i in 0..GROUP_SIZE {
                v[i] = cube[i * PATCH_SIZE + j][lane];
            }
            if forward {
                dct8_forward(&mut v);
            } else {
                dct8_inverse(&mut v);
            }
            for i in 0..GROUP_SIZE {
                cube[i * PATCH_SIZE + j][lane] = v[i];
            }
        }
    }
}

/// Separable 3D forward DCT over an 8x8x8 group: for each spatial dimension
/// a column DCT followed by a transpose (leaving the tiles back in their
/// original orientation after two rounds), then a final DCT along depth.
pub fn dct3d_forward<F: Bm3dFloat>(cube: &mut PatchCube<F>) {
    for _ in 0..2 {
        for tile in cube.chunks_mut(PATCH_SIZE) {
            dct8_columns(tile, true);
            transpose8(tile);
        }
    }
    dct8_depth(cube, true);
}

/// Inverse of [`dct3d_forward`]; the round trip multiplies by 4096.
pub fn dct3d_inverse<F: Bm3dFloat>(cube: &mut PatchCube<F>) {
    for _ in 0..2 {
        for tile in cube.chunks_mut(PATCH_SIZE) {
            dct8_columns(tile, false);
            transpose8(tile);
        }
    }
    dct8_depth(cube, false);
}
