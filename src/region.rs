//! Region-relative positions: a coarse region key plus a fine in-cell
//! offset, packed into one wider coordinate for arithmetic that crosses
//! cell boundaries.
//!
//! The split halves per-entity storage (the coarse half lives in the
//! partition, not on the entity) and makes boundary crossing implicit:
//! velocity is added to the packed coordinate with plain wrapping
//! same-layout addition, and splitting the sum back apart *is* the
//! boundary test. No comparisons, no branch per axis.
//!
//! Packing is a pair of plain functions, not operator sugar: every place
//! that concatenates a key with an offset says so by name.

use crate::fixed::{FixedScalar, FixedVec2, I8F8, U0F8, U8F0, U8F8};

/// Coarse 2D region key; unsigned, zero fractional bits, wrapping.
pub type CellKey = FixedVec2<U8F0>;
/// Fine 2D in-cell offset in `[0, 1)` of a cell per axis.
pub type CellOffset = FixedVec2<U0F8>;
/// Packed 2D world coordinate: key in the high byte, offset in the low.
pub type WorldVec = FixedVec2<U8F8>;
/// Per-step 2D displacement, in the packed coordinate's fractional scale.
pub type VelocityVec = FixedVec2<I8F8>;

/// Concatenates a region key (high bits) and a fine offset (low bits) into
/// the packed world layout. Bit-exact: no scaling is involved, the key's
/// raw byte simply becomes the integer byte of the result.
#[inline]
pub fn to_world(key: U8F0, offset: U0F8) -> U8F8 {
    U8F8::from_raw(((key.to_raw() as u16) << U0F8::TOTAL_BITS) | offset.to_raw() as u16)
}

/// Splits a packed world coordinate back into region key and fine offset.
/// Exact inverse of [`to_world`].
#[inline]
pub fn from_world(world: U8F8) -> (U8F0, U0F8) {
    let raw = world.to_raw();
    (
        U8F0::from_raw((raw >> U0F8::TOTAL_BITS) as u8),
        U0F8::from_raw(raw as u8),
    )
}

/// Advances a packed coordinate by a signed displacement in the same
/// fractional scale: two's-complement wrapping addition on the raw bits.
/// A carry out of the fractional byte lands in the key byte, so a
/// subsequent [`from_world`] yields the neighboring region's key and a
/// renormalized offset; past the top of the key space the coordinate
/// wraps around, matching the key layout's own wrapping.
#[inline]
pub fn advance(world: U8F8, delta: I8F8) -> U8F8 {
    U8F8::from_raw(world.to_raw().wrapping_add(delta.to_raw() as u16))
}

/// Componentwise [`to_world`].
#[inline]
pub fn to_world_xy(key: CellKey, offset: CellOffset) -> WorldVec {
    WorldVec::new(to_world(key.x, offset.x), to_world(key.y, offset.y))
}

/// Componentwise [`from_world`].
#[inline]
pub fn from_world_xy(world: WorldVec) -> (CellKey, CellOffset) {
    let (kx, ox) = from_world(world.x);
    let (ky, oy) = from_world(world.y);
    (CellKey::new(kx, ky), CellOffset::new(ox, oy))
}

/// Componentwise [`advance`].
#[inline]
pub fn advance_xy(world: WorldVec, delta: VelocityVec) -> WorldVec {
    WorldVec::new(advance(world.x, delta.x), advance(world.y, delta.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_concatenates_key_and_offset_bits() {
        let world = to_world(U8F0::from_raw(3), U0F8::from_raw(255));
        assert_eq!(world.to_raw(), 0x03FF);

        let (key, offset) = from_world(world);
        assert_eq!(key.to_raw(), 3);
        assert_eq!(offset.to_raw(), 255);
    }

    #[test]
    fn test_unpack_inverts_pack_for_all_key_offset_pairs() {
        for key in [0u8, 1, 15, 128, 255] {
            for off in [0u8, 1, 127, 255] {
                let world = to_world(U8F0::from_raw(key), U0F8::from_raw(off));
                let (k, o) = from_world(world);
                assert_eq!((k.to_raw(), o.to_raw()), (key, off));
            }
        }
    }

    #[test]
    fn test_advance_carries_across_the_region_boundary() {
        // Offset raw 255 (just below the cell boundary) plus velocity raw 2
        // crosses into the next region with offset raw 1.
        let world = to_world(U8F0::from_raw(3), U0F8::from_raw(255));
        let moved = advance(world, I8F8::from_raw(2));
        let (key, offset) = from_world(moved);
        assert_eq!(key.to_raw(), 4, "carry must increment the region key");
        assert_eq!(offset.to_raw(), 1, "offset renormalizes past the boundary");
    }

    #[test]
    fn test_advance_borrows_backward_across_the_boundary() {
        let world = to_world(U8F0::from_raw(4), U0F8::from_raw(1));
        let moved = advance(world, I8F8::from_raw(-2));
        let (key, offset) = from_world(moved);
        assert_eq!(key.to_raw(), 3);
        assert_eq!(offset.to_raw(), 255);
    }

    #[test]
    fn test_advance_wraps_at_the_top_of_the_key_space() {
        let world = to_world(U8F0::from_raw(255), U0F8::from_raw(255));
        let moved = advance(world, I8F8::from_raw(1));
        let (key, offset) = from_world(moved);
        assert_eq!(key.to_raw(), 0);
        assert_eq!(offset.to_raw(), 0);
    }

    #[test]
    fn test_zero_displacement_is_the_identity() {
        let world = to_world(U8F0::from_raw(9), U0F8::from_raw(42));
        assert_eq!(advance(world, I8F8::ZERO), world);
    }

    #[test]
    fn test_componentwise_pack_and_advance() {
        let key = CellKey::new(U8F0::from_raw(3), U8F0::from_raw(7));
        let offset = CellOffset::new(U0F8::from_raw(255), U0F8::from_raw(0));
        let world = to_world_xy(key, offset);

        let vel = VelocityVec::new(I8F8::from_raw(2), I8F8::from_raw(-1));
        let (new_key, new_offset) = from_world_xy(advance_xy(world, vel));

        assert_eq!(new_key.x.to_raw(), 4);
        assert_eq!(new_offset.x.to_raw(), 1);
        assert_eq!(new_key.y.to_raw(), 6);
        assert_eq!(new_offset.y.to_raw(), 255);
    }
}
