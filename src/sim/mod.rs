//! Double-buffered, data-parallel simulation step.
//!
//! Each step runs two passes over a fixed entity population with a hard
//! barrier between them:
//!
//! 1. **Force pass**: reads the *current* partition and the entity array,
//!    writes the force accumulator array. Every entity interacts only with
//!    the other members of its own region bag, so the interaction cutoff
//!    must not exceed one region cell (enforced at construction).
//! 2. **Integrate pass**: folds forces into velocities, applies damping,
//!    advances the packed world coordinate per axis, and files every
//!    entity into the *next* partition under its (possibly new) region
//!    key. The next partition is cleared at the start of this pass and the
//!    two partitions swap roles at the end.
//!
//! The current partition and entity array are read-only for the whole
//! step; force writes are disjoint per entity. That read/write separation
//! is what lets both passes fan out across worker threads without locks.
//! Next-partition inserts are collected in entity-index order and merged
//! single-threaded after the parallel section, so the simulation is
//! bit-deterministic regardless of worker count.

use std::hash::{Hash, Hasher};
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::SimConfig;
use crate::fixed::{mixed, FixedScalar, FixedVec2, RangeError, I16F16, I24F8, I8F8, U0F8, U8F0};
use crate::partition::{EntityId, RegionPartition};
use crate::region::{advance_xy, from_world_xy, to_world_xy, CellKey, CellOffset, VelocityVec, WorldVec};
use crate::snapshot::{SimSnapshot, SNAPSHOT_VERSION};

mod forces;


/// Per-entity force accumulator: the 8.8 fractional scale with integer
/// headroom for summing many pairwise contributions.
pub type ForceVec = FixedVec2<I24F8>;

/// One simulated entity: fine in-cell position and velocity, nothing else.
/// The coarse region key is owned by the partition, not the entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Particle {
    pub offset: CellOffset,
    pub velocity: VelocityVec,
}

/// Rejected simulation construction.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("positions ({positions}) and velocities ({velocities}) differ in length")]
    MismatchedInputs { positions: usize, velocities: usize },
    #[error("grid {cols}x{rows} outside the supported 1..=256 range")]
    GridOutOfRange { cols: u32, rows: u32 },
    #[error("cutoff {cutoff} exceeds one region cell; interactions across a region boundary would be missed")]
    CutoffExceedsCell { cutoff: f32 },
    #[error("snapshot state arrays disagree in length")]
    InconsistentSnapshot,
    #[error("config value out of range: {0}")]
    Range(#[from] RangeError),
}

/// Fixed-point tuning derived once from the float config.
#[derive(Clone, Copy)]
struct Tuning {
    damping: U0F8,
    gain: I24F8,
    cutoff_sq: I24F8,
    max_push: I24F8,
}

impl Tuning {
    fn from_config(config: &SimConfig) -> Result<Self, BuildError> {
        if !(1..=256).contains(&config.grid_cols) || !(1..=256).contains(&config.grid_rows) {
            return Err(BuildError::GridOutOfRange {
                cols: config.grid_cols,
                rows: config.grid_rows,
            });
        }
        if config.cutoff > 1.0 {
            return Err(BuildError::CutoffExceedsCell {
                cutoff: config.cutoff,
            });
        }
        // A damping of 1.0 or more fails the U0F8 range check here, which
        // is exactly the strictly-less-than-one contract.
        let damping = U0F8::from_float(config.damping as f64)?;
        let cutoff = I24F8::from_float(config.cutoff as f64)?;
        Ok(Self {
            damping,
            gain: I24F8::from_float(config.repulsion as f64)?,
            cutoff_sq: cutoff * cutoff,
            max_push: I24F8::from_float(config.max_push as f64)?,
        })
    }
}

/// A particle population on a torus of region cells, stepped in place.
///
/// The value itself is the handle: constructing it allocates every array
/// and both partition buffers up front, dropping it releases them, and no
/// allocation happens on the steady-state step path.
pub struct Simulation {
    config: SimConfig,
    tuning: Tuning,
    particles: Vec<Particle>,
    /// Mirror of each entity's current region key; the partition remains
    /// the authoritative grouping, this array just gives the passes O(1)
    /// access to their own bag.
    keys: Vec<CellKey>,
    forces: Vec<ForceVec>,
    current: RegionPartition,
    next: RegionPartition,
    steps: u64,
}

impl Simulation {
    /// Builds a simulation from packed world positions and velocities.
    pub fn new(
        config: SimConfig,
        positions: &[WorldVec],
        velocities: &[VelocityVec],
    ) -> Result<Self, BuildError> {
        if positions.len() != velocities.len() {
            return Err(BuildError::MismatchedInputs {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        let tuning = Tuning::from_config(&config)?;

        let mut current = RegionPartition::new(config.grid_cols, config.grid_rows);
        let next = RegionPartition::new(config.grid_cols, config.grid_rows);
        let mut particles = Vec::with_capacity(positions.len());
        let mut keys = Vec::with_capacity(positions.len());

        for (i, (&position, &velocity)) in positions.iter().zip(velocities).enumerate() {
            let (key, offset) = from_world_xy(position);
            let key = wrap_key(key, config.grid_cols, config.grid_rows);
            current.insert(key, EntityId(i as u32));
            keys.push(key);
            particles.push(Particle { offset, velocity });
        }

        info!(
            "Simulation ready: {} entities on a {}x{} region grid",
            particles.len(),
            config.grid_cols,
            config.grid_rows
        );

        Ok(Self {
            config,
            tuning,
            forces: vec![ForceVec::zero(); particles.len()],
            particles,
            keys,
            current,
            next,
            steps: 0,
        })
    }

    /// Rebuilds a simulation from a previously captured snapshot. The
    /// resumed run continues the original trajectory bit-for-bit.
    pub fn from_snapshot(snapshot: &SimSnapshot) -> Result<Self, BuildError> {
        if snapshot.particles.len() != snapshot.keys.len() {
            return Err(BuildError::InconsistentSnapshot);
        }
        let tuning = Tuning::from_config(&snapshot.config)?;

        let mut current =
            RegionPartition::new(snapshot.config.grid_cols, snapshot.config.grid_rows);
        let next = RegionPartition::new(snapshot.config.grid_cols, snapshot.config.grid_rows);
        for (i, &key) in snapshot.keys.iter().enumerate() {
            current.insert(key, EntityId(i as u32));
        }

        Ok(Self {
            config: snapshot.config.clone(),
            tuning,
            particles: snapshot.particles.clone(),
            keys: snapshot.keys.clone(),
            forces: vec![ForceVec::zero(); snapshot.particles.len()],
            current,
            next,
            steps: snapshot.steps,
        })
    }

    /// Runs one full step: force pass, integrate pass, buffer swap.
    /// Returns only after the swap; the partition read by the next step is
    /// exactly the one this step filled.
    pub fn step(&mut self) {
        self.force_pass();
        self.integrate_pass();
        std::mem::swap(&mut self.current, &mut self.next);
        self.steps += 1;
    }

    fn force_pass(&mut self) {
        let start = Instant::now();

        let particles = &self.particles;
        let keys = &self.keys;
        let current = &self.current;
        let tuning = self.tuning;

        self.forces
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| {
                let me = particles[i].offset;
                let mut accum = ForceVec::zero();
                for &other in current.bag(keys[i]) {
                    if other.index() == i {
                        continue;
                    }
                    let delta = offset_delta(me, particles[other.index()].offset);
                    accum = accum
                        + forces::repulsion(delta, tuning.cutoff_sq, tuning.gain, tuning.max_push);
                }
                *out = accum;
            });

        let duration = start.elapsed();
        if duration.as_millis() > 5 {
            info!(
                "[FORCE_PASS] slow pass: {:?} | entities: {}",
                duration,
                self.particles.len()
            );
        }
        crate::profile_log!(
            self.steps,
            "[FORCE_PASS] {:?} | entities: {}",
            duration,
            self.particles.len()
        );
    }

    fn integrate_pass(&mut self) {
        let start = Instant::now();

        self.next.clear();
        let damping = self.tuning.damping;
        let (cols, rows) = (self.config.grid_cols, self.config.grid_rows);

        let inserts: Vec<(CellKey, EntityId)> = self
            .particles
            .par_iter_mut()
            .zip(self.keys.par_iter_mut())
            .zip(self.forces.par_iter())
            .enumerate()
            .map(|(i, ((particle, key), force))| {
                let velocity = VelocityVec::new(
                    damp_axis(particle.velocity.x, force.x, damping),
                    damp_axis(particle.velocity.y, force.y, damping),
                );
                let world = to_world_xy(*key, particle.offset);
                let (new_key, new_offset) = from_world_xy(advance_xy(world, velocity));
                let new_key = wrap_key(new_key, cols, rows);

                particle.offset = new_offset;
                particle.velocity = velocity;
                *key = new_key;
                (new_key, EntityId(i as u32))
            })
            .collect();

        // Single-threaded merge in entity-index order keeps bag contents
        // deterministic regardless of how the parallel section was split.
        for (key, id) in inserts {
            self.next.insert(key, id);
        }
        debug_assert!(self.next.contains_each_entity_once(self.particles.len()));

        let duration = start.elapsed();
        if duration.as_millis() > 5 {
            info!(
                "[INTEGRATE_PASS] slow pass: {:?} | entities: {}",
                duration,
                self.particles.len()
            );
        }
        crate::profile_log!(
            self.steps,
            "[INTEGRATE_PASS] {:?} | entities: {}",
            duration,
            self.particles.len()
        );
    }

    pub fn entity_count(&self) -> usize {
        self.particles.len()
    }

    /// Completed step count.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current region key of one entity. An out-of-range id is a
    /// programming error, not a recoverable condition.
    pub fn region_of(&self, id: EntityId) -> CellKey {
        self.keys[id.index()]
    }

    /// Fine position and velocity of one entity.
    pub fn particle(&self, id: EntityId) -> Particle {
        self.particles[id.index()]
    }

    /// (total entries, occupied bags) of the current partition.
    pub fn occupancy(&self) -> (usize, usize) {
        (self.current.total_entries(), self.current.non_empty_bags())
    }

    /// Visits every entity whose region key lies in the inclusive
    /// rectangle `[key_min, key_max]`, passing the unpacked world position
    /// and a color hint. The hint is a deterministic hash of the region
    /// key alone, so renderers can tint by cell without reading any
    /// simulation state.
    pub fn for_each_visible(
        &self,
        key_min: CellKey,
        key_max: CellKey,
        mut visit: impl FnMut([f32; 3], f32),
    ) {
        for ky in key_min.y.to_raw()..=key_max.y.to_raw() {
            for kx in key_min.x.to_raw()..=key_max.x.to_raw() {
                let key = CellKey::new(U8F0::from_raw(kx), U8F0::from_raw(ky));
                let hint = color_hint(key);
                for &id in self.current.bag(key) {
                    let world = to_world_xy(key, self.particles[id.index()].offset);
                    visit([world.x.to_f32(), world.y.to_f32(), 0.0], hint);
                }
            }
        }
    }

    /// Order-sensitive digest of the full deterministic state. Two runs
    /// from identical initial state agree on this after any number of
    /// steps.
    pub fn state_checksum(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.steps.hash(&mut hasher);
        for (particle, key) in self.particles.iter().zip(&self.keys) {
            particle.hash(&mut hasher);
            key.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Captures the full deterministic state for later resume.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            version: SNAPSHOT_VERSION,
            steps: self.steps,
            config: self.config.clone(),
            particles: self.particles.clone(),
            keys: self.keys.clone(),
        }
    }
}

fn wrap_key(key: CellKey, cols: u32, rows: u32) -> CellKey {
    CellKey::new(
        U8F0::from_raw((key.x.to_raw() as u32 % cols) as u8),
        U8F0::from_raw((key.y.to_raw() as u32 % rows) as u8),
    )
}

/// Signed separation between two in-cell offsets, at force precision.
fn offset_delta(a: CellOffset, b: CellOffset) -> ForceVec {
    ForceVec::new(mixed::sub(a.x, b.x), mixed::sub(a.y, b.y))
}

/// Folds one force axis into one velocity axis and applies damping.
///
/// The sum is clamped to the velocity layout's range (the speed limit),
/// then scaled by the sub-one damping factor: the mixed multiply lands at
/// 16 fractional bits and the explicit shift-and-reinterpret brings it
/// back to the 8-bit velocity scale, truncating low bits.
fn damp_axis(velocity: I8F8, force: I24F8, damping: U0F8) -> I8F8 {
    let combined: I24F8 = mixed::add(velocity, force);
    let limited = combined.clamp(
        I24F8::from_raw(i16::MIN as i32),
        I24F8::from_raw(i16::MAX as i32),
    );
    let scaled: I16F16 = mixed::mul(limited, damping);
    let damped: I24F8 = mixed::reinterpret(scaled >> U0F8::FRAC_BITS);
    I8F8::from_raw(damped.to_raw() as i16)
}

fn color_hint(key: CellKey) -> f32 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() & 0x00FF_FFFF) as f32 / 16_777_216.0
}
