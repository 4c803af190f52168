//! Numeric element types accepted by the pipeline.
//!
//! `Numeric` is a closed trait: it is implemented here for the primitive
//! integer and floating-point types and cannot be implemented elsewhere.

use serde::Serialize;
use std::fmt::{Debug, Display};
use std::ops::{Add, Mul};

mod sealed {
    pub trait Sealed {}
}

/// Arithmetic-capable value that can flow through the pipeline.
pub trait Numeric:
    sealed::Sealed
    + Copy
    + Send
    + Sync
    + 'static
    + PartialOrd
    + Add<Output = Self>
    + Mul<Output = Self>
    + Debug
    + Display
    + Serialize
{
    const ZERO: Self;
    const ONE: Self;

    /// `self + other`, or `None` if the result is not representable.
    ///
    /// Floating-point types never fail; they saturate to infinity.
    fn checked_add(self, other: Self) -> Option<Self>;

    /// `self * other`, or `None` if the result is not representable.
    fn checked_mul(self, other: Self) -> Option<Self>;

    /// `self * other`, clamped to the type's range.
    fn saturating_mul(self, other: Self) -> Self;

    /// Number of indices `i` in `[0, self)` when counting up from zero by one.
    fn index_count(self) -> usize;

    /// Converts a sequence length into this type.
    fn from_count(count: u32) -> Option<Self>;

    /// The `index`-th value when counting up from zero by one.
    ///
    /// Callers stay below `index_count()` of some bound, so integers never
    /// clamp. Floats round above their exact-integer range.
    fn from_index(index: usize) -> Self;

    /// Equality used when comparing against a reference total.
    ///
    /// Exact for integers; relative tolerance for floats since summation
    /// order changes rounding.
    fn approx_eq(self, other: Self) -> bool;

    /// `self + other * other`, checked.
    fn checked_add_square(self, other: Self) -> Option<Self> {
        self.checked_add(other.checked_mul(other)?)
    }
}

macro_rules! impl_numeric_int {
    ($($t:ty),*) => {$(
        impl sealed::Sealed for $t {}

        impl Numeric for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            fn checked_add(self, other: Self) -> Option<Self> {
                <$t>::checked_add(self, other)
            }

            fn checked_mul(self, other: Self) -> Option<Self> {
                <$t>::checked_mul(self, other)
            }

            fn saturating_mul(self, other: Self) -> Self {
                <$t>::saturating_mul(self, other)
            }

            #[allow(unused_comparisons)]
            fn index_count(self) -> usize {
                if self <= 0 {
                    0
                } else {
                    usize::try_from(self).unwrap_or(usize::MAX)
                }
            }

            fn from_count(count: u32) -> Option<Self> {
                <$t>::try_from(count).ok()
            }

            fn from_index(index: usize) -> Self {
                <$t>::try_from(index).unwrap_or(<$t>::MAX)
            }

            fn approx_eq(self, other: Self) -> bool {
                self == other
            }
        }
    )*};
}

macro_rules! impl_numeric_float {
    ($($t:ty => $eps:expr),*) => {$(
        impl sealed::Sealed for $t {}

        impl Numeric for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            fn checked_add(self, other: Self) -> Option<Self> {
                Some(self + other)
            }

            fn checked_mul(self, other: Self) -> Option<Self> {
                Some(self * other)
            }

            fn saturating_mul(self, other: Self) -> Self {
                self * other
            }

            fn index_count(self) -> usize {
                // NaN and non-positive bounds produce nothing
                if !(self > 0.0) {
                    0
                } else {
                    self.ceil() as usize
                }
            }

            fn from_count(count: u32) -> Option<Self> {
                Some(count as $t)
            }

            fn from_index(index: usize) -> Self {
                index as $t
            }

            fn approx_eq(self, other: Self) -> bool {
                if self == other {
                    return true;
                }
                let scale = self.abs().max(other.abs()).max(1.0);
                (self - other).abs() <= scale * $eps
            }
        }
    )*};
}

impl_numeric_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_numeric_float!(f32 => 1e-5, f64 => 1e-9);

/// `x * x`, clamped to the type's range.
pub fn square<N: Numeric>(x: N) -> N {
    x.saturating_mul(x)
}

/// `x * x * x`, clamped to the type's range.
pub fn cube<N: Numeric>(x: N) -> N {
    x.saturating_mul(x).saturating_mul(x)
}

/// `x + x`, clamped to the type's range.
pub fn double<N: Numeric>(x: N) -> N {
    x.saturating_mul(N::ONE + N::ONE)
}

pub fn identity<N: Numeric>(x: N) -> N {
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_count_integers() {
        assert_eq!(5i64.index_count(), 5);
        assert_eq!(0i32.index_count(), 0);
        assert_eq!((-3i32).index_count(), 0);
        assert_eq!(7u8.index_count(), 7);
    }

    #[test]
    fn test_index_count_floats() {
        assert_eq!(2.5f64.index_count(), 3);
        assert_eq!(3.0f64.index_count(), 3);
        assert_eq!((-1.0f32).index_count(), 0);
        assert_eq!(f64::NAN.index_count(), 0);
        // Past 2^24 an f32 can no longer count by one, but the count is exact
        assert_eq!(16_777_220f32.index_count(), 16_777_220);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(i64::from_index(42), 42);
        assert_eq!(u8::from_index(255), 255);
        assert_eq!(f64::from_index(7), 7.0);
        assert_eq!(f32::from_index(16_777_217), 16_777_216.0);
    }

    #[test]
    fn test_checked_add_square() {
        assert_eq!(10i64.checked_add_square(4), Some(26));
        assert_eq!(i8::MAX.checked_add_square(1), None);
        assert_eq!(0i8.checked_add_square(12), None);
        assert_eq!(1.5f64.checked_add_square(2.0), Some(5.5));
    }

    #[test]
    fn test_from_count() {
        assert_eq!(i8::from_count(127), Some(127));
        assert_eq!(i8::from_count(128), None);
        assert_eq!(f32::from_count(5), Some(5.0));
    }

    #[test]
    fn test_builtin_transforms() {
        assert_eq!(square(4i32), 16);
        assert_eq!(cube(-2i64), -8);
        assert_eq!(double(21u64), 42);
        assert_eq!(identity(7u16), 7);
        assert_eq!(square(u8::MAX), u8::MAX);
    }

    #[test]
    fn test_approx_eq() {
        assert!(1770i64.approx_eq(1770));
        assert!(!1770i64.approx_eq(1771));
        assert!((0.1f64 + 0.2).approx_eq(0.3));
        assert!(!1.0f64.approx_eq(1.001));
    }
}
