// src/element.rs

//! Numeric types that can occupy a register lane.
//!
//! Only `i32`, `f32` and `i64` are supported. The trait is sealed so every
//! backend can rely on the element being plain data whose all-zero bit
//! pattern is a valid value.

use core::fmt::Debug;

mod sealed {
    pub trait Sealed {}
}

/// A lane element type.
pub trait Element:
    sealed::Sealed + Copy + Clone + Debug + Default + PartialEq + Send + Sync + 'static
{
    /// Fill value for inactive lanes.
    const ZERO: Self;

    /// Short type name used in log output.
    const NAME: &'static str;

    /// Lane addition. Integers wrap at their native width.
    fn lane_add(self, rhs: Self) -> Self;

    /// Lane multiplication. Integers wrap at their native width.
    fn lane_mul(self, rhs: Self) -> Self;
}

// Integer arithmetic uses wrapping to match SIMD semantics
macro_rules! impl_element_int {
    ($t:ty, $name:expr) => {
        impl sealed::Sealed for $t {}

        impl Element for $t {
            const ZERO: Self = 0;
            const NAME: &'static str = $name;

            #[inline(always)]
            fn lane_add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline(always)]
            fn lane_mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
        }
    };
}

impl_element_int!(i32, "i32");
impl_element_int!(i64, "i64");

impl sealed::Sealed for f32 {}

impl Element for f32 {
    const ZERO: Self = 0.0;
    const NAME: &'static str = "f32";

    #[inline(always)]
    fn lane_add(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline(always)]
    fn lane_mul(self, rhs: Self) -> Self {
        self * rhs
    }
}
