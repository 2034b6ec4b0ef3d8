//! Inner-loop vector kernels.
//!
//! The skip-gram update spends nearly all its time in two primitives over
//! embedding rows: a dot product and `y += alpha * x`. Both have a native
//! implementation (AVX2 + FMA on x86_64) and a portable ndarray
//! implementation. They follow the same update rule and differ only in
//! floating-point summation order.
//!
//! Selection happens once per process in [`Kernel::global`]. Falling back to
//! the portable kernel is a logged degradation, never an error.

use ndarray::{ArrayView1, ArrayViewMut1};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Why the native kernel could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelUnavailable {
    /// No native implementation exists for this architecture.
    #[error("no native kernel for target architecture {0}")]
    UnsupportedArch(&'static str),
    /// The CPU lacks an instruction set extension the kernel needs.
    #[error("CPU does not support {0}")]
    MissingCpuFeature(&'static str),
}

/// The two primitives the updaters need.
pub trait VectorKernel {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// `a · b`. Callers guarantee equal lengths.
    fn dot(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32;

    /// `y += alpha * x`. Callers guarantee equal lengths.
    fn axpy(&self, alpha: f32, x: ArrayView1<'_, f32>, y: ArrayViewMut1<'_, f32>);
}

/// ndarray implementation; always available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortableKernel;

impl VectorKernel for PortableKernel {
    fn name(&self) -> &'static str {
        "portable"
    }

    #[inline]
    fn dot(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
        a.dot(&b)
    }

    #[inline]
    fn axpy(&self, alpha: f32, x: ArrayView1<'_, f32>, mut y: ArrayViewMut1<'_, f32>) {
        y.scaled_add(alpha, &x);
    }
}

/// AVX2 + FMA implementation. Only constructible through [`NativeKernel::try_new`],
/// which proves the CPU supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeKernel {
    _detected: (),
}

impl NativeKernel {
    /// Detect CPU support.
    pub fn try_new() -> Result<Self, KernelUnavailable> {
        #[cfg(target_arch = "x86_64")]
        {
            if !is_x86_feature_detected!("avx2") {
                return Err(KernelUnavailable::MissingCpuFeature("avx2"));
            }
            if !is_x86_feature_detected!("fma") {
                return Err(KernelUnavailable::MissingCpuFeature("fma"));
            }
            Ok(Self { _detected: () })
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            Err(KernelUnavailable::UnsupportedArch(std::env::consts::ARCH))
        }
    }
}

impl VectorKernel for NativeKernel {
    fn name(&self) -> &'static str {
        "native-avx2-fma"
    }

    #[inline]
    fn dot(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
        #[cfg(target_arch = "x86_64")]
        {
            if let (Some(a), Some(b)) = (a.as_slice(), b.as_slice()) {
                if a.len() == b.len() {
                    // SAFETY: `try_new` verified avx2 and fma; lengths are equal.
                    return unsafe { dot_avx2_fma(a, b) };
                }
            }
        }
        PortableKernel.dot(a, b)
    }

    #[inline]
    fn axpy(&self, alpha: f32, x: ArrayView1<'_, f32>, mut y: ArrayViewMut1<'_, f32>) {
        #[cfg(target_arch = "x86_64")]
        {
            if let (Some(xs), Some(ys)) = (x.as_slice(), y.as_slice_mut()) {
                if xs.len() == ys.len() {
                    // SAFETY: `try_new` verified avx2 and fma; lengths are equal.
                    unsafe { axpy_avx2_fma(alpha, xs, ys) };
                    return;
                }
            }
        }
        PortableKernel.axpy(alpha, x, y);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_avx2_fma(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len();
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();

    // Two accumulators, 16 floats per iteration
    let chunks = len / 16;
    for i in 0..chunks {
        let idx = i * 16;
        let va0 = _mm256_loadu_ps(a.as_ptr().add(idx));
        let vb0 = _mm256_loadu_ps(b.as_ptr().add(idx));
        let va1 = _mm256_loadu_ps(a.as_ptr().add(idx + 8));
        let vb1 = _mm256_loadu_ps(b.as_ptr().add(idx + 8));
        acc0 = _mm256_fmadd_ps(va0, vb0, acc0);
        acc1 = _mm256_fmadd_ps(va1, vb1, acc1);
    }

    let mut idx = chunks * 16;
    if idx + 8 <= len {
        let va = _mm256_loadu_ps(a.as_ptr().add(idx));
        let vb = _mm256_loadu_ps(b.as_ptr().add(idx));
        acc0 = _mm256_fmadd_ps(va, vb, acc0);
        idx += 8;
    }

    let sum = _mm256_add_ps(acc0, acc1);
    let lanes: [f32; 8] = std::mem::transmute(sum);
    let mut total: f32 = lanes.iter().sum();

    for i in idx..len {
        total += a[i] * b[i];
    }
    total
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn axpy_avx2_fma(alpha: f32, x: &[f32], y: &mut [f32]) {
    let len = x.len();
    let va = _mm256_set1_ps(alpha);

    let chunks = len / 8;
    for i in 0..chunks {
        let idx = i * 8;
        let vx = _mm256_loadu_ps(x.as_ptr().add(idx));
        let vy = _mm256_loadu_ps(y.as_ptr().add(idx));
        _mm256_storeu_ps(y.as_mut_ptr().add(idx), _mm256_fmadd_ps(va, vx, vy));
    }

    for i in (chunks * 8)..len {
        y[i] += alpha * x[i];
    }
}

/// The kernel chosen for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Native(NativeKernel),
    Portable(PortableKernel),
}

static GLOBAL: OnceLock<Kernel> = OnceLock::new();

impl Kernel {
    /// Probe for the native kernel, logging the outcome.
    pub fn detect() -> Self {
        match NativeKernel::try_new() {
            Ok(native) => {
                info!(kernel = native.name(), "using native skip-gram kernel");
                Self::Native(native)
            }
            Err(reason) => {
                warn!(
                    %reason,
                    kernel = PortableKernel.name(),
                    "native skip-gram kernel unavailable, falling back to portable kernel"
                );
                Self::Portable(PortableKernel)
            }
        }
    }

    /// Detect once per process and reuse the result.
    pub fn global() -> Self {
        *GLOBAL.get_or_init(Self::detect)
    }

    pub fn portable() -> Self {
        Self::Portable(PortableKernel)
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl VectorKernel for Kernel {
    fn name(&self) -> &'static str {
        match self {
            Self::Native(k) => k.name(),
            Self::Portable(k) => k.name(),
        }
    }

    #[inline]
    fn dot(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
        match self {
            Self::Native(k) => k.dot(a, b),
            Self::Portable(k) => k.dot(a, b),
        }
    }

    #[inline]
    fn axpy(&self, alpha: f32, x: ArrayView1<'_, f32>, y: ArrayViewMut1<'_, f32>) {
        match self {
            Self::Native(k) => k.axpy(alpha, x, y),
            Self::Portable(k) => k.axpy(alpha, x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn ramp(n: usize, scale: f32) -> Array1<f32> {
        Array1::from_iter((0..n).map(|i| ((i as f32) * 0.37).sin() * scale))
    }

    #[test]
    fn test_portable_dot_and_axpy() {
        let a = Array1::from(vec![1.0f32, 2.0, 3.0]);
        let b = Array1::from(vec![4.0f32, -5.0, 6.0]);
        assert!((PortableKernel.dot(a.view(), b.view()) - 12.0).abs() < 1e-6);

        let mut y = b.clone();
        PortableKernel.axpy(2.0, a.view(), y.view_mut());
        assert_eq!(y, Array1::from(vec![6.0f32, -1.0, 12.0]));
    }

    #[test]
    fn test_global_is_stable() {
        assert_eq!(Kernel::global(), Kernel::global());
    }

    #[test]
    fn test_native_matches_portable() {
        let Ok(native) = NativeKernel::try_new() else {
            return;
        };
        // Odd lengths exercise the 16-wide, 8-wide and scalar tails.
        for n in [1usize, 7, 8, 15, 16, 17, 31, 100, 128] {
            let a = ramp(n, 1.0);
            let b = ramp(n, -0.5);
            let d_native = native.dot(a.view(), b.view());
            let d_portable = PortableKernel.dot(a.view(), b.view());
            assert!((d_native - d_portable).abs() < 1e-4, "n={n}");

            let mut y_native = b.clone();
            let mut y_portable = b.clone();
            native.axpy(0.3, a.view(), y_native.view_mut());
            PortableKernel.axpy(0.3, a.view(), y_portable.view_mut());
            for (u, v) in y_native.iter().zip(y_portable.iter()) {
                assert!((u - v).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_native_handles_strided_views() {
        let Ok(native) = NativeKernel::try_new() else {
            return;
        };
        let a = ramp(20, 1.0);
        let b = ramp(20, 2.0);
        let a_strided = a.slice(ndarray::s![..;2]);
        let b_strided = b.slice(ndarray::s![..;2]);
        let expected = PortableKernel.dot(a_strided, b_strided);
        assert!((native.dot(a_strided, b_strided) - expected).abs() < 1e-5);
    }

    #[cfg(not(target_arch = "x86_64"))]
    #[test]
    fn test_unsupported_arch_reports_reason() {
        assert!(matches!(
            NativeKernel::try_new(),
            Err(KernelUnavailable::UnsupportedArch(_))
        ));
        assert!(!Kernel::detect().is_native());
    }
}
