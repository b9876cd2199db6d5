//! Mixed-precision arithmetic between two different layouts.
//!
//! Every function here takes the result layout as an explicit type
//! parameter: the resolver computes what the minimum correct layout *is*
//! (see [`Layout`]) but never widens storage on the caller's behalf. A
//! destination too narrow for the true result silently truncates, exactly
//! as the same-layout operators do, unless the `checked_arith` feature is
//! enabled, in which case an out-of-range narrow is fatal.
//!
//! Nothing here tracks semantic units. Two values whose fractional scales
//! happen to line up combine without complaint even when one is a
//! region-relative offset and the other a world-absolute coordinate; making
//! that mistake detectable would change observable numeric results, so the
//! gap stays.

use super::FixedScalar;

/// A fixed-point layout as a runtime value, for computing result layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub total_bits: u32,
    pub frac_bits: u32,
    pub signed: bool,
}

impl Layout {
    pub fn of<T: FixedScalar>() -> Self {
        Self {
            total_bits: T::TOTAL_BITS,
            frac_bits: T::FRAC_BITS,
            signed: T::SIGNED,
        }
    }

    /// Magnitude bits above the binary point.
    pub fn int_bits(self) -> u32 {
        self.total_bits - self.frac_bits - self.signed as u32
    }

    fn with(int_bits: u32, frac_bits: u32, signed: bool) -> Self {
        Self {
            total_bits: int_bits + frac_bits + signed as u32,
            frac_bits,
            signed,
        }
    }

    /// Minimum layout holding the sum of two operands: the larger
    /// fractional-bit count and the larger integer-bit count.
    pub fn for_sum(self, other: Self) -> Self {
        Self::with(
            self.int_bits().max(other.int_bits()),
            self.frac_bits.max(other.frac_bits),
            self.signed || other.signed,
        )
    }

    /// Minimum layout holding the difference of two operands. Always
    /// signed: even two unsigned operands can produce a negative result.
    pub fn for_difference(self, other: Self) -> Self {
        Self::with(
            self.int_bits().max(other.int_bits()),
            self.frac_bits.max(other.frac_bits),
            true,
        )
    }

    /// Minimum layout holding the product: fractional-bit counts add, as
    /// do integer-bit counts.
    pub fn for_product(self, other: Self) -> Self {
        Self::with(
            self.int_bits() + other.int_bits(),
            self.frac_bits + other.frac_bits,
            self.signed || other.signed,
        )
    }

    /// Minimum layout holding the quotient: the dividend's fractional-bit
    /// count minus the divisor's. The dividend must carry at least as many
    /// fractional bits as the divisor.
    pub fn for_quotient(self, other: Self) -> Self {
        debug_assert!(self.frac_bits >= other.frac_bits);
        Self::with(
            self.int_bits() + other.frac_bits,
            self.frac_bits - other.frac_bits,
            self.signed || other.signed,
        )
    }
}

fn narrow<R: FixedScalar>(wide: i128) -> R {
    #[cfg(feature = "checked_arith")]
    {
        let (lo, hi) = if R::SIGNED {
            (-(1i128 << (R::TOTAL_BITS - 1)), (1i128 << (R::TOTAL_BITS - 1)) - 1)
        } else {
            (0, (1i128 << R::TOTAL_BITS) - 1)
        };
        assert!(
            (lo..=hi).contains(&wide),
            "mixed-precision result {wide} does not fit a {}-bit destination",
            R::TOTAL_BITS
        );
    }
    R::from_wide(wide)
}

/// Adds two values of different layouts.
///
/// The operand with fewer fractional bits is raw-shifted left by the
/// difference before the add; `R` must carry the larger fractional-bit
/// count of the two. Commutative bit-for-bit.
pub fn add<A: FixedScalar, B: FixedScalar, R: FixedScalar>(a: A, b: B) -> R {
    let frac = A::FRAC_BITS.max(B::FRAC_BITS);
    debug_assert_eq!(
        R::FRAC_BITS,
        frac,
        "sum destination must carry the larger fractional-bit count"
    );
    narrow((a.to_wide() << (frac - A::FRAC_BITS)) + (b.to_wide() << (frac - B::FRAC_BITS)))
}

/// Subtracts `b` from `a` across layouts; alignment as in [`add`].
pub fn sub<A: FixedScalar, B: FixedScalar, R: FixedScalar>(a: A, b: B) -> R {
    let frac = A::FRAC_BITS.max(B::FRAC_BITS);
    debug_assert_eq!(
        R::FRAC_BITS,
        frac,
        "difference destination must carry the larger fractional-bit count"
    );
    narrow((a.to_wide() << (frac - A::FRAC_BITS)) - (b.to_wide() << (frac - B::FRAC_BITS)))
}

/// Multiplies across layouts. No alignment: the raw values multiply
/// directly and `R` must carry the *sum* of the operands' fractional-bit
/// counts. Down-shifting into a narrower scale is the caller's job, via
/// `>>` plus [`reinterpret`].
pub fn mul<A: FixedScalar, B: FixedScalar, R: FixedScalar>(a: A, b: B) -> R {
    debug_assert_eq!(
        R::FRAC_BITS,
        A::FRAC_BITS + B::FRAC_BITS,
        "product destination must carry the sum of the fractional-bit counts"
    );
    narrow(a.to_wide() * b.to_wide())
}

/// Divides across layouts. `R` must carry the dividend's fractional-bit
/// count minus the divisor's. Division by zero panics.
pub fn div<A: FixedScalar, B: FixedScalar, R: FixedScalar>(a: A, b: B) -> R {
    debug_assert_eq!(
        R::FRAC_BITS as i64,
        A::FRAC_BITS as i64 - B::FRAC_BITS as i64,
        "quotient destination must carry the fractional-bit difference"
    );
    narrow(a.to_wide() / b.to_wide())
}

/// Reinterprets raw bits into another layout of the same total width.
///
/// This is the companion of the raw shift operators: a value of layout
/// `(I, F)` right-shifted by `k` represents its original value only as
/// layout `(I+k, F-k)`, and this function is the explicit, auditable way
/// to perform that relabeling.
pub fn reinterpret<A: FixedScalar, R: FixedScalar>(v: A) -> R {
    debug_assert_eq!(
        A::TOTAL_BITS,
        R::TOTAL_BITS,
        "reinterpretation preserves total width"
    );
    R::from_wide(v.to_wide())
}
