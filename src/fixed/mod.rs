//! Deterministic fixed-point arithmetic.
//!
//! Every quantity in the simulation is a raw two's-complement or unsigned
//! integer interpreted against a fixed binary scale, so identical inputs
//! produce bit-identical results on every platform and at every optimization
//! level. Floating point only appears at the edges: constructing values from
//! configuration files and reading values back out for display.
//!
//! Each layout (total bits, fractional bits, signedness) is its own
//! monomorphic value type, generated by the `fixed_scalar!` macro below.
//! There is no numeric tower and no dynamic dispatch; operations that
//! mix two layouts go through the free functions in [`mixed`], which make the
//! alignment shifts and the destination layout explicit at the call site.
//!
//! Type names follow the `I<int>F<frac>` convention (the integer part of the
//! name includes the sign bit for signed types). `INT_BITS` on the
//! [`FixedScalar`] trait counts magnitude bits only.

use std::fmt;
use std::hash::Hash;
use std::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use vec::{FixedVec2, FixedVec3};

pub mod mixed;
mod vec;


/// Input fell outside the representable range of the target layout.
///
/// Raised by the range-checked constructors (`from_int`, `from_float`);
/// never raised by arithmetic, which wraps or truncates as documented.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("value {value} outside representable range [{min}, {max}]")]
pub struct RangeError {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Layout constants and raw-bit access shared by every generated scalar type.
///
/// This trait exists as a bound for the generic vector types and the
/// mixed-precision functions; it is never used as a trait object.
pub trait FixedScalar:
    Copy
    + Eq
    + Ord
    + Hash
    + Default
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// Width of the raw integer.
    const TOTAL_BITS: u32;
    /// Bits below the binary point.
    const FRAC_BITS: u32;
    /// Magnitude bits above the binary point (sign bit excluded).
    const INT_BITS: u32;
    const SIGNED: bool;

    /// Raw bits widened to `i128` (sign-extended for signed layouts,
    /// zero-extended for unsigned ones).
    fn to_wide(self) -> i128;

    /// Truncating narrow from `i128` back to the raw width. Bits beyond
    /// `TOTAL_BITS` are discarded; this is the truncation the arithmetic
    /// rules are specified in terms of, not an error path.
    fn from_wide(raw: i128) -> Self;

    fn zero() -> Self;
}

/// Generates one fixed-point scalar type per layout.
///
/// The optional trailing `ONE` ident emits the constant encoding of the real
/// value 1, which only exists when the layout has at least one integer bit.
macro_rules! fixed_scalar {
    ($(#[$meta:meta])* $name:ident($raw:ty, $wide:ty), frac = $frac:expr, signed $(, $one:ident)?) => {
        fixed_scalar!(@common $(#[$meta])* $name($raw, $wide), $frac, true $(, $one)?);

        impl std::ops::Neg for $name {
            type Output = Self;
            #[inline(always)]
            fn neg(self) -> Self {
                Self(self.0.wrapping_neg())
            }
        }
    };
    ($(#[$meta:meta])* $name:ident($raw:ty, $wide:ty), frac = $frac:expr, unsigned $(, $one:ident)?) => {
        fixed_scalar!(@common $(#[$meta])* $name($raw, $wide), $frac, false $(, $one)?);
    };
    (@common $(#[$meta:meta])* $name:ident($raw:ty, $wide:ty), $frac:expr, $signed:expr $(, $one:ident)?) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Divisor converting the raw integer to the represented value.
            pub const SCALE: $wide = (1 as $wide) << $frac;
            /// Smallest positive representable increment.
            pub const EPSILON: Self = Self(1);
            pub const ZERO: Self = Self(0);
            pub const MIN: Self = Self(<$raw>::MIN);
            pub const MAX: Self = Self(<$raw>::MAX);
            /// Smallest representable real value.
            pub const RANGE_MIN: f64 = <$raw>::MIN as f64 / Self::SCALE as f64;
            /// Largest representable real value.
            pub const RANGE_MAX: f64 = <$raw>::MAX as f64 / Self::SCALE as f64;
            $(
                /// Raw encoding of the real value 1.
                pub const $one: Self = Self((1 as $raw) << $frac);
            )?

            /// Encodes an integer, failing if it is not representable.
            pub fn from_int(i: i64) -> Result<Self, RangeError> {
                let scaled = (i as i128) << $frac;
                if scaled < <$raw>::MIN as i128 || scaled > <$raw>::MAX as i128 {
                    return Err(RangeError {
                        value: i as f64,
                        min: Self::RANGE_MIN,
                        max: Self::RANGE_MAX,
                    });
                }
                Ok(Self(scaled as $raw))
            }

            /// Encodes a float, failing outside `[RANGE_MIN, RANGE_MAX]`.
            ///
            /// Rounds to the nearest representable value; ties round half
            /// away from zero (`f64::round`), which keeps the conversion
            /// deterministic across platforms.
            pub fn from_float(f: f64) -> Result<Self, RangeError> {
                if !f.is_finite() || f < Self::RANGE_MIN || f > Self::RANGE_MAX {
                    return Err(RangeError {
                        value: f,
                        min: Self::RANGE_MIN,
                        max: Self::RANGE_MAX,
                    });
                }
                Ok(Self((f * Self::SCALE as f64).round() as $raw))
            }

            /// Truncating conversion to the integer part (floor for
            /// negative values: the fractional bits are simply discarded).
            #[inline]
            pub fn to_int(self) -> i64 {
                ((self.0 as i128) >> $frac) as i64
            }

            #[inline]
            pub fn to_f32(self) -> f32 {
                self.to_f64() as f32
            }

            /// Exact reconstruction `raw / SCALE`.
            #[inline]
            pub fn to_f64(self) -> f64 {
                self.0 as f64 / Self::SCALE as f64
            }

            /// Wraps raw bits without scaling or range checks. Used for
            /// reinterpretation after shifts and for bit packing; the caller
            /// is responsible for the bits fitting the layout.
            #[inline(always)]
            pub const fn from_raw(raw: $raw) -> Self {
                Self(raw)
            }

            #[inline(always)]
            pub const fn to_raw(self) -> $raw {
                self.0
            }

            /// Clamps to a closed range. Raw-integer comparison, so exact.
            #[inline]
            pub fn clamp(self, lo: Self, hi: Self) -> Self {
                Self(self.0.clamp(lo.0, hi.0))
            }
        }

        impl FixedScalar for $name {
            const TOTAL_BITS: u32 = <$raw>::BITS;
            const FRAC_BITS: u32 = $frac;
            const INT_BITS: u32 = <$raw>::BITS - $frac - $signed as u32;
            const SIGNED: bool = $signed;

            #[inline(always)]
            fn to_wide(self) -> i128 {
                self.0 as i128
            }

            #[inline(always)]
            fn from_wide(raw: i128) -> Self {
                Self(raw as $raw)
            }

            #[inline(always)]
            fn zero() -> Self {
                Self(0)
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;
            /// Raw integer addition. Wraps on overflow; panics instead when
            /// the `checked_arith` feature is enabled.
            #[inline(always)]
            fn add(self, rhs: Self) -> Self {
                #[cfg(feature = "checked_arith")]
                let raw = self
                    .0
                    .checked_add(rhs.0)
                    .expect(concat!(stringify!($name), " addition overflow"));
                #[cfg(not(feature = "checked_arith"))]
                let raw = self.0.wrapping_add(rhs.0);
                Self(raw)
            }
        }

        impl std::ops::Sub for $name {
            type Output = Self;
            #[inline(always)]
            fn sub(self, rhs: Self) -> Self {
                #[cfg(feature = "checked_arith")]
                let raw = self
                    .0
                    .checked_sub(rhs.0)
                    .expect(concat!(stringify!($name), " subtraction overflow"));
                #[cfg(not(feature = "checked_arith"))]
                let raw = self.0.wrapping_sub(rhs.0);
                Self(raw)
            }
        }

        impl std::ops::Mul for $name {
            type Output = Self;
            /// Widens, multiplies, renormalizes by `>> FRAC_BITS`, then
            /// narrows back. Low bits beyond the layout are truncated, not
            /// rounded.
            #[inline(always)]
            fn mul(self, rhs: Self) -> Self {
                Self((((self.0 as $wide) * (rhs.0 as $wide)) >> $frac) as $raw)
            }
        }

        impl std::ops::Div for $name {
            type Output = Self;
            /// Pre-shifts the dividend left by `FRAC_BITS` to preserve the
            /// fraction, then divides and narrows. Division by zero panics.
            #[inline(always)]
            fn div(self, rhs: Self) -> Self {
                Self((((self.0 as $wide) << $frac) / (rhs.0 as $wide)) as $raw)
            }
        }

        impl std::ops::Shl<u32> for $name {
            type Output = Self;
            /// Shifts the raw bits only. The result represents the original
            /// value only when reinterpreted into a layout whose
            /// fractional-bit count differs by the shift amount; see
            /// [`mixed::reinterpret`].
            #[inline(always)]
            fn shl(self, k: u32) -> Self {
                Self(self.0 << k)
            }
        }

        impl std::ops::Shr<u32> for $name {
            type Output = Self;
            /// Shifts the raw bits only; the same reinterpretation rule as
            /// the left shift applies, with the fractional-bit count
            /// decreasing by the shift amount.
            #[inline(always)]
            fn shr(self, k: u32) -> Self {
                Self(self.0 >> k)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}; raw {})", stringify!($name), self.to_f64(), self.0)
            }
        }
    };
}

fixed_scalar! {
    /// Unsigned region-key scalar: 8 integer bits, no fraction. Wraps
    /// modulo its bit width, which makes the key space a torus.
    U8F0(u8, u16), frac = 0, unsigned, ONE
}

fixed_scalar! {
    /// Unsigned fine-offset scalar: 8 fractional bits, no integer part.
    /// Covers `[0, 1)` of one region cell; the real value 1 is not
    /// representable, so this layout has no `ONE`.
    U0F8(u8, u16), frac = 8, unsigned
}

fixed_scalar! {
    /// Unsigned packed world scalar: a region key in the high byte, a fine
    /// offset in the low byte. Produced by [`crate::region::to_world`].
    U8F8(u16, u32), frac = 8, unsigned, ONE
}

fixed_scalar! {
    /// Signed velocity scalar in the 8.8 lattice.
    I8F8(i16, i32), frac = 8, signed, ONE
}

fixed_scalar! {
    /// Signed force-accumulator scalar: the 8.8 fractional scale with
    /// integer headroom for summing many pairwise contributions.
    I24F8(i32, i64), frac = 8, signed, ONE
}

fixed_scalar! {
    /// Wide unsigned region-key scalar.
    U16F0(u16, u32), frac = 0, unsigned, ONE
}

fixed_scalar! {
    /// Wide unsigned fine-offset scalar.
    U0F16(u16, u32), frac = 16, unsigned
}

fixed_scalar! {
    /// Wide unsigned packed world scalar for the 16.16 lattice.
    U16F16(u32, u64), frac = 16, unsigned, ONE
}

fixed_scalar! {
    /// General-purpose signed scalar, 16.16.
    I16F16(i32, i64), frac = 16, signed, ONE
}

fixed_scalar! {
    /// Wide general-purpose signed scalar, 48.16.
    I48F16(i64, i128), frac = 16, signed, ONE
}
