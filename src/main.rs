use std::fs;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use harrier::config::{load_ron_or_default, DriverConfig, SimConfig};
use harrier::fixed::{FixedVec2, I8F8, U8F8};
use harrier::profile_log;
use harrier::region::{VelocityVec, WorldVec};
use harrier::sim::Simulation;
use harrier::snapshot::save_snapshot;

fn setup_file_logging() -> String {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir).expect("Failed to create logs directory");
    }

    // Clean up old log files, keeping only the last 25
    cleanup_old_logs(&log_dir, 25);

    // Generate timestamped filename
    let now = chrono::Local::now();
    let log_filename = format!("harrier_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_file_path = log_dir.join(&log_filename);
    let log_path_str = log_file_path.to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // Don't rotate during a single run
        &log_dir,
        &log_filename,
    );

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harrier=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("harrier") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Sort by modified time (oldest first)
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

/// Seeded random population spread over the whole key space. The driver is
/// the only place randomness exists; the core never draws a number.
fn build_population(driver: &DriverConfig) -> (Vec<WorldVec>, Vec<VelocityVec>) {
    let mut rng = StdRng::seed_from_u64(driver.seed);
    let mut positions = Vec::with_capacity(driver.entity_count);
    let mut velocities = Vec::with_capacity(driver.entity_count);
    for _ in 0..driver.entity_count {
        positions.push(FixedVec2::new(
            U8F8::from_raw(rng.random::<u16>()),
            U8F8::from_raw(rng.random::<u16>()),
        ));
        velocities.push(FixedVec2::new(
            I8F8::from_raw(rng.random_range(-64..=64)),
            I8F8::from_raw(rng.random_range(-64..=64)),
        ));
    }
    (positions, velocities)
}

fn main() {
    let log_file = setup_file_logging();
    info!("Logging to {}", log_file);

    let sim_config: SimConfig = load_ron_or_default("config/sim.ron");
    let driver: DriverConfig = load_ron_or_default("config/driver.ron");

    let (positions, velocities) = build_population(&driver);
    let mut sim = match Simulation::new(sim_config, &positions, &velocities) {
        Ok(sim) => sim,
        Err(e) => {
            tracing::error!("Failed to build simulation: {}", e);
            std::process::exit(1);
        }
    };

    let start = std::time::Instant::now();
    for _ in 0..driver.steps {
        sim.step();
        profile_log!(
            sim.steps(),
            "step {} | checksum {:#018x}",
            sim.steps(),
            sim.state_checksum()
        );
    }
    let elapsed = start.elapsed();

    let (entries, occupied_bags) = sim.occupancy();
    info!(
        "Ran {} steps over {} entities in {:?} ({:.1} steps/s)",
        driver.steps,
        sim.entity_count(),
        elapsed,
        driver.steps as f64 / elapsed.as_secs_f64().max(1e-9),
    );
    info!(
        "Final occupancy: {} entities across {} regions | checksum {:#018x}",
        entries,
        occupied_bags,
        sim.state_checksum()
    );

    if !driver.snapshot_path.is_empty() {
        match save_snapshot(&driver.snapshot_path, &sim.snapshot()) {
            Ok(()) => info!("Snapshot written to {}", driver.snapshot_path),
            Err(e) => tracing::error!("Failed to write snapshot: {}", e),
        }
    }
}
