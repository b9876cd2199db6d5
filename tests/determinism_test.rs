//! End-to-end determinism tests.
//!
//! The whole point of running the simulation on fixed-point arithmetic is
//! that a run is bit-reproducible: same initial state, same trajectory,
//! down to the last raw bit. These tests exercise that claim across
//! repeated runs, across worker counts, and across a save/restore in the
//! middle of a run.

use harrier::config::SimConfig;
use harrier::fixed::{FixedVec2, I8F8, U8F8};
use harrier::partition::EntityId;
use harrier::region::{VelocityVec, WorldVec};
use harrier::sim::Simulation;
use harrier::snapshot::{load_snapshot, save_snapshot};

/// Seeded random population spread over the whole key space.
fn seeded_population(seed: u64, count: usize) -> (Vec<WorldVec>, Vec<VelocityVec>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let positions = (0..count)
        .map(|_| FixedVec2::new(U8F8::from_raw(rng.u16(..)), U8F8::from_raw(rng.u16(..))))
        .collect();
    let velocities = (0..count)
        .map(|_| {
            FixedVec2::new(
                I8F8::from_raw(rng.i16(-96..=96)),
                I8F8::from_raw(rng.i16(-96..=96)),
            )
        })
        .collect();
    (positions, velocities)
}

fn build(seed: u64, count: usize) -> Simulation {
    let (positions, velocities) = seeded_population(seed, count);
    Simulation::new(SimConfig::default(), &positions, &velocities).unwrap()
}

#[test]
fn test_two_runs_from_identical_state_agree_bit_for_bit() {
    let count = 500;
    let mut a = build(0xA11CE, count);
    let mut b = build(0xA11CE, count);
    assert_eq!(a.state_checksum(), b.state_checksum());

    for step in 0..100 {
        a.step();
        b.step();
        assert_eq!(
            a.state_checksum(),
            b.state_checksum(),
            "runs diverged at step {}",
            step + 1
        );
    }

    // Checksum agreement is the cheap check; the actual claim is raw
    // per-entity equality.
    for i in 0..count {
        let id = EntityId(i as u32);
        assert_eq!(a.particle(id), b.particle(id), "entity {} raw state diverged", i);
        assert_eq!(a.region_of(id), b.region_of(id), "entity {} region diverged", i);
    }

    println!(
        "100 steps over {} entities, final checksum {:#018x}",
        count,
        a.state_checksum()
    );
}

#[test]
fn test_worker_count_does_not_change_the_trajectory() {
    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();

    let mut one_worker = build(0xBEE5, 400);
    let mut default_pool = build(0xBEE5, 400);

    single.install(|| {
        for _ in 0..50 {
            one_worker.step();
        }
    });
    for _ in 0..50 {
        default_pool.step();
    }

    assert_eq!(
        one_worker.state_checksum(),
        default_pool.state_checksum(),
        "one worker and the default pool must produce the same bits"
    );
}

#[test]
fn test_resume_from_snapshot_continues_the_trajectory() {
    let count = 300;
    let mut uninterrupted = build(0xD1CE, count);
    for _ in 0..40 {
        uninterrupted.step();
    }

    // Same population, but stop halfway, push the state through the disk
    // format, and finish from the restored copy.
    let mut first_half = build(0xD1CE, count);
    for _ in 0..20 {
        first_half.step();
    }
    let path = std::env::temp_dir()
        .join(format!("harrier_resume_{}.snap", std::process::id()))
        .to_string_lossy()
        .into_owned();
    save_snapshot(&path, &first_half.snapshot()).unwrap();
    let restored = load_snapshot(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let mut resumed = Simulation::from_snapshot(&restored).unwrap();
    assert_eq!(resumed.steps(), 20);
    for _ in 0..20 {
        resumed.step();
    }

    assert_eq!(resumed.steps(), uninterrupted.steps());
    assert_eq!(
        resumed.state_checksum(),
        uninterrupted.state_checksum(),
        "a resumed run must continue the original trajectory bit-for-bit"
    );
    for i in 0..count {
        let id = EntityId(i as u32);
        assert_eq!(resumed.particle(id), uninterrupted.particle(id));
    }
}

#[test]
fn test_checksum_is_sensitive_to_one_raw_bit() {
    let (positions, mut velocities) = seeded_population(7, 64);
    let pristine = Simulation::new(SimConfig::default(), &positions, &velocities).unwrap();

    velocities[0] = FixedVec2::new(
        I8F8::from_raw(velocities[0].x.to_raw() ^ 1),
        velocities[0].y,
    );
    let perturbed = Simulation::new(SimConfig::default(), &positions, &velocities).unwrap();

    assert_ne!(
        pristine.state_checksum(),
        perturbed.state_checksum(),
        "flipping the lowest raw velocity bit of one entity must change the digest"
    );
}
