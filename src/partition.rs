//! Spatial partition: a multi-map from region key to the entities
//! currently inside that region.
//!
//! The partition divides the key space into a fixed grid of bags, one per
//! cell, allocated once at simulation start and reused every step. Bags
//! are plain `Vec`s rather than hash sets for cache locality; iteration
//! order within a bag is unspecified and nothing may depend on it.
//!
//! Region keys wrap onto the grid modulo its dimensions, so every key the
//! position model can produce maps to some bag (torus topology). There is
//! no remove operation: entities are never deleted mid-step, only
//! reassigned wholesale into the other buffer of the double-buffered pair.

use fixedbitset::FixedBitSet;

use crate::region::CellKey;

/// Stable index of an entity in the simulation's dense array.
///
/// The partition stores these references only; it never owns entity data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Multi-map from region key to a bag of entity indices.
pub struct RegionPartition {
    cols: u32,
    rows: u32,
    bags: Vec<Vec<EntityId>>,
}

impl RegionPartition {
    /// Creates an empty partition over a `cols x rows` grid of regions.
    /// Dimensions must be nonzero and fit the 8-bit key space.
    pub fn new(cols: u32, rows: u32) -> Self {
        assert!(cols >= 1 && rows >= 1, "partition grid must be nonempty");
        assert!(
            cols <= 256 && rows <= 256,
            "partition grid exceeds the 8-bit key space"
        );
        Self {
            cols,
            rows,
            bags: vec![Vec::new(); (cols * rows) as usize],
        }
    }

    #[inline]
    fn bag_index(&self, key: CellKey) -> usize {
        let col = key.x.to_raw() as u32 % self.cols;
        let row = key.y.to_raw() as u32 % self.rows;
        (row * self.cols + col) as usize
    }

    /// Appends an entity reference to the bag for `key`. Amortized O(1);
    /// after the first few steps the backing storage has grown to steady
    /// state and insertion no longer allocates.
    #[inline]
    pub fn insert(&mut self, key: CellKey, id: EntityId) {
        let idx = self.bag_index(key);
        self.bags[idx].push(id);
    }

    /// Empties every bag without releasing backing storage.
    pub fn clear(&mut self) {
        for bag in &mut self.bags {
            bag.clear();
        }
    }

    /// All entity references currently filed under `key`, in unspecified
    /// order.
    #[inline]
    pub fn bag(&self, key: CellKey) -> &[EntityId] {
        &self.bags[self.bag_index(key)]
    }

    /// Invokes `visit` once per entity reference stored under `key`.
    pub fn for_each_in_bag(&self, key: CellKey, mut visit: impl FnMut(EntityId)) {
        for &id in self.bag(key) {
            visit(id);
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total entity entries across all bags. Diagnostics only.
    pub fn total_entries(&self) -> usize {
        self.bags.iter().map(|bag| bag.len()).sum()
    }

    /// Number of occupied bags. Diagnostics only.
    pub fn non_empty_bags(&self) -> usize {
        self.bags.iter().filter(|bag| !bag.is_empty()).count()
    }

    /// Checks that every entity index in `0..entity_count` appears in
    /// exactly one bag: none lost, none duplicated.
    pub fn contains_each_entity_once(&self, entity_count: usize) -> bool {
        let mut seen = FixedBitSet::with_capacity(entity_count);
        for bag in &self.bags {
            for id in bag {
                if id.index() >= entity_count || seen.contains(id.index()) {
                    return false;
                }
                seen.insert(id.index());
            }
        }
        seen.count_ones(..) == entity_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::U8F0;

    fn key(x: u8, y: u8) -> CellKey {
        CellKey::new(U8F0::from_raw(x), U8F0::from_raw(y))
    }

    #[test]
    fn test_insert_files_entities_under_their_key() {
        let mut partition = RegionPartition::new(16, 16);
        partition.insert(key(3, 3), EntityId(0));
        partition.insert(key(3, 3), EntityId(1));
        partition.insert(key(4, 3), EntityId(2));

        assert_eq!(partition.bag(key(3, 3)).len(), 2);
        assert_eq!(partition.bag(key(4, 3)), &[EntityId(2)]);
        assert!(partition.bag(key(0, 0)).is_empty());
        assert_eq!(partition.total_entries(), 3);
        assert_eq!(partition.non_empty_bags(), 2);
    }

    #[test]
    fn test_keys_wrap_onto_the_grid() {
        let mut partition = RegionPartition::new(16, 16);
        partition.insert(key(19, 2), EntityId(7));
        // 19 mod 16 == 3: same bag.
        assert_eq!(partition.bag(key(3, 2)), &[EntityId(7)]);
    }

    #[test]
    fn test_clear_empties_bags_and_keeps_them_usable() {
        let mut partition = RegionPartition::new(8, 8);
        for i in 0..100 {
            partition.insert(key(i as u8 % 8, 0), EntityId(i));
        }
        partition.clear();
        assert_eq!(partition.total_entries(), 0);
        assert_eq!(partition.non_empty_bags(), 0);

        partition.insert(key(1, 0), EntityId(9));
        assert_eq!(partition.bag(key(1, 0)), &[EntityId(9)]);
    }

    #[test]
    fn test_for_each_in_bag_visits_every_entry() {
        let mut partition = RegionPartition::new(4, 4);
        partition.insert(key(2, 2), EntityId(5));
        partition.insert(key(2, 2), EntityId(6));

        let mut visited = Vec::new();
        partition.for_each_in_bag(key(2, 2), |id| visited.push(id));
        visited.sort_by_key(|id| id.0);
        assert_eq!(visited, vec![EntityId(5), EntityId(6)]);
    }

    #[test]
    fn test_completeness_detects_lost_and_duplicated_entities() {
        let mut partition = RegionPartition::new(4, 4);
        partition.insert(key(0, 0), EntityId(0));
        partition.insert(key(1, 0), EntityId(1));
        assert!(partition.contains_each_entity_once(2));
        // Missing entity 2.
        assert!(!partition.contains_each_entity_once(3));
        // Duplicated entity 1.
        partition.insert(key(2, 0), EntityId(1));
        assert!(!partition.contains_each_entity_once(2));
    }
}
