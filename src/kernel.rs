//! Dot-product kernels used by the affine layers.
//!
//! Every `Layer` output cell is one inner product between an input row and a
//! weight row, so this is where inference spends nearly all of its time.
//! This module exposes a single abstraction over that operation:
//!
//! - `Scalar`: a plain sequential loop. It is the reference the others are
//!   tested against.
//! - `Lanes`: portable fixed-width accumulation (8 independent lanes plus a
//!   scalar tail). The compiler lowers it to whatever vector width the target
//!   supports.
//! - `Avx2`: x86_64 AVX2 + FMA intrinsics, 8 floats per step.
//! - `Neon`: aarch64 NEON intrinsics, 2x4 floats per step.
//!
//! The vector kernels reassociate the sum, so they agree with `Scalar` within
//! float32 rounding tolerance rather than bit for bit. An intrinsic kernel whose
//! CPU capability is missing at run time degrades to `Lanes`.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const LANES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Scalar,
    Lanes,
    Avx2,
    Neon,
}

impl Kernel {
    pub const ALL: [Kernel; 4] = [Kernel::Scalar, Kernel::Lanes, Kernel::Avx2, Kernel::Neon];

    /// Best kernel the running CPU supports.
    pub fn detect() -> Self {
        if Kernel::Avx2.is_available() {
            Kernel::Avx2
        } else if Kernel::Neon.is_available() {
            Kernel::Neon
        } else {
            Kernel::Lanes
        }
    }

    /// Kernels that can run natively on this CPU.
    pub fn available() -> Vec<Kernel> {
        Self::ALL.into_iter().filter(|k| k.is_available()).collect()
    }

    pub fn is_available(self) -> bool {
        match self {
            Kernel::Scalar | Kernel::Lanes => true,
            Kernel::Avx2 => avx2_detected(),
            Kernel::Neon => neon_detected(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kernel::Scalar => "scalar",
            Kernel::Lanes => "lanes",
            Kernel::Avx2 => "avx2",
            Kernel::Neon => "neon",
        }
    }

    /// Inner product of `a` and `b`.
    ///
    /// Shape contract: `a.len() == b.len()`.
    #[inline]
    pub fn dot(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        match self {
            Kernel::Scalar => dot_scalar(a, b),
            Kernel::Lanes => dot_lanes(a, b),
            Kernel::Avx2 => {
                #[cfg(target_arch = "x86_64")]
                if avx2_detected() {
                    // SAFETY: avx2 and fma were detected on this CPU.
                    return unsafe { x86::dot_avx2(a, b) };
                }
                dot_lanes(a, b)
            }
            Kernel::Neon => {
                #[cfg(target_arch = "aarch64")]
                if neon_detected() {
                    // SAFETY: neon was detected on this CPU.
                    return unsafe { arm::dot_neon(a, b) };
                }
                dot_lanes(a, b)
            }
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kernel {
    type Err = Error;

    /// Accepts a kernel name or `auto` for [`Kernel::detect`].
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Kernel::detect()),
            "scalar" => Ok(Kernel::Scalar),
            "lanes" => Ok(Kernel::Lanes),
            "avx2" => Ok(Kernel::Avx2),
            "neon" => Ok(Kernel::Neon),
            other => Err(Error::InvalidConfig(format!(
                "unknown kernel {other:?}; expected auto, scalar, lanes, avx2 or neon"
            ))),
        }
    }
}

#[inline]
fn avx2_detected() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

#[inline]
fn neon_detected() -> bool {
    #[cfg(target_arch = "aarch64")]
    {
        std::arch::is_aarch64_feature_detected!("neon")
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        false
    }
}

#[inline]
fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0_f32;
    for (x, w) in a.iter().zip(b) {
        sum += x * w;
    }
    sum
}

#[inline]
fn dot_lanes(a: &[f32], b: &[f32]) -> f32 {
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail = dot_scalar(a_chunks.remainder(), b_chunks.remainder());

    let mut acc = [0.0_f32; LANES];
    for (xa, xb) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            acc[lane] += xa[lane] * xb[lane];
        }
    }

    // Pairwise reduction keeps the tree shape fixed across runs.
    let s0 = (acc[0] + acc[4]) + (acc[1] + acc[5]);
    let s1 = (acc[2] + acc[6]) + (acc[3] + acc[7]);
    (s0 + s1) + tail
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    use super::{LANES, dot_scalar};

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot_avx2(a: &[f32], b: &[f32]) -> f32 {
        let n = a.len().min(b.len());
        let body = n - n % LANES;

        unsafe {
            let mut acc = _mm256_setzero_ps();
            let mut i = 0;
            while i < body {
                let va = _mm256_loadu_ps(a.as_ptr().add(i));
                let vb = _mm256_loadu_ps(b.as_ptr().add(i));
                acc = _mm256_fmadd_ps(va, vb, acc);
                i += LANES;
            }

            let hi = _mm256_extractf128_ps(acc, 1);
            let lo = _mm256_castps256_ps128(acc);
            let sum = _mm_add_ps(lo, hi);
            let sum = _mm_hadd_ps(sum, sum);
            let sum = _mm_hadd_ps(sum, sum);
            _mm_cvtss_f32(sum) + dot_scalar(&a[body..n], &b[body..n])
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod arm {
    use std::arch::aarch64::*;

    use super::{LANES, dot_scalar};

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_neon(a: &[f32], b: &[f32]) -> f32 {
        let n = a.len().min(b.len());
        let body = n - n % LANES;

        unsafe {
            let mut acc0 = vdupq_n_f32(0.0);
            let mut acc1 = vdupq_n_f32(0.0);
            let mut i = 0;
            while i < body {
                let pa = a.as_ptr().add(i);
                let pb = b.as_ptr().add(i);
                acc0 = vfmaq_f32(acc0, vld1q_f32(pa), vld1q_f32(pb));
                acc1 = vfmaq_f32(acc1, vld1q_f32(pa.add(4)), vld1q_f32(pb.add(4)));
                i += LANES;
            }
            vaddvq_f32(vaddq_f32(acc0, acc1)) + dot_scalar(&a[body..n], &b[body..n])
        }
    }
}
