//! Scalar float shims.
//!
//! Host builds use the std intrinsics; MCU builds route through `libm`.
//! Everything in the planner is f32, matching the precision budget of the
//! controller class this targets.

#[cfg(feature = "std")]
#[inline]
pub(crate) fn sqrt(v: f32) -> f32 {
    v.sqrt()
}

#[cfg(all(not(feature = "std"), feature = "no-std-math"))]
#[inline]
pub(crate) fn sqrt(v: f32) -> f32 {
    libm::sqrtf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn cbrt(v: f32) -> f32 {
    v.cbrt()
}

#[cfg(all(not(feature = "std"), feature = "no-std-math"))]
#[inline]
pub(crate) fn cbrt(v: f32) -> f32 {
    libm::cbrtf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn abs(v: f32) -> f32 {
    v.abs()
}

#[cfg(all(not(feature = "std"), feature = "no-std-math"))]
#[inline]
pub(crate) fn abs(v: f32) -> f32 {
    libm::fabsf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn ceil(v: f32) -> f32 {
    v.ceil()
}

#[cfg(all(not(feature = "std"), feature = "no-std-math"))]
#[inline]
pub(crate) fn ceil(v: f32) -> f32 {
    libm::ceilf(v)
}

#[cfg(feature = "std")]
#[inline]
pub(crate) fn round64(v: f64) -> f64 {
    v.round()
}

#[cfg(all(not(feature = "std"), feature = "no-std-math"))]
#[inline]
pub(crate) fn round64(v: f64) -> f64 {
    libm::round(v)
}

/// Squares a value. Reads better than `v * v` in the jerk integrals.
#[inline]
pub(crate) fn square(v: f32) -> f32 {
    v * v
}
