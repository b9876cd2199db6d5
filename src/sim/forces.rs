//! Pairwise repulsion between entities sharing a region.

use crate::fixed::I24F8;

use super::ForceVec;

/// Repulsion felt by an entity from one neighbor, given the separation
/// `delta` pointing from the neighbor toward the entity.
///
/// Inverse-square falloff with a strength cap, zero at and beyond the
/// cutoff. The direction is the unnormalized separation, which keeps the
/// pair exactly antisymmetric up to the one-epsilon truncation of the
/// final multiply: `repulsion(-delta, ..) == -repulsion(delta, ..)` within
/// one raw step per axis.
///
/// Entities closer than one fixed-point epsilon (including exactly
/// coincident ones) feel nothing; there is no direction to push along
/// that both sides of the pair would agree on.
pub(super) fn repulsion(
    delta: ForceVec,
    cutoff_sq: I24F8,
    gain: I24F8,
    max_push: I24F8,
) -> ForceVec {
    let dist_sq = delta.length_squared();
    if dist_sq >= cutoff_sq || dist_sq == I24F8::ZERO {
        return ForceVec::zero();
    }
    let strength = (cutoff_sq / dist_sq) * gain;
    let capped = strength.clamp(I24F8::ZERO, max_push);
    delta * capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedVec2;

    fn fx(raw: i32) -> I24F8 {
        I24F8::from_raw(raw)
    }

    #[test]
    fn test_repulsion_is_zero_at_and_beyond_the_cutoff() {
        let cutoff_sq = fx(64); // 0.25, i.e. cutoff 0.5 cells
        let delta = FixedVec2::new(fx(128), fx(0)); // distance 0.5 exactly
        let push = repulsion(delta, cutoff_sq, fx(64), fx(2048));
        assert_eq!(push, ForceVec::zero());
    }

    #[test]
    fn test_repulsion_points_along_the_separation() {
        let delta = FixedVec2::new(fx(-128), fx(0));
        let push = repulsion(delta, fx(256), fx(64), fx(2048));
        assert!(push.x < I24F8::ZERO, "push must point away from the neighbor");
        assert_eq!(push.y, I24F8::ZERO);
    }

    #[test]
    fn test_repulsion_strength_is_capped() {
        // One raw step of separation produces the steepest falloff; the
        // cap must bound it.
        let delta = FixedVec2::new(fx(1), fx(0));
        let max_push = fx(512);
        let push = repulsion(delta, fx(256), fx(256), max_push);
        assert!(push.x <= (delta * max_push).x);
    }

    #[test]
    fn test_coincident_entities_feel_nothing() {
        let push = repulsion(ForceVec::zero(), fx(256), fx(64), fx(2048));
        assert_eq!(push, ForceVec::zero());
    }
}
