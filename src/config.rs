use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Deterministic simulation parameters, fixed for the lifetime of a run.
/// Changing these between runs changes the bit-exact trajectory; the float
/// fields are converted into fixed-point once, at simulation build time,
/// through the range-checked constructors.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Region grid width, in cells. At most 256 (the 8-bit key space).
    pub grid_cols: u32,
    /// Region grid height, in cells.
    pub grid_rows: u32,
    /// Velocity retained per step, strictly less than 1.
    pub damping: f32,
    /// Gain applied to the pairwise repulsion strength.
    pub repulsion: f32,
    /// Interaction cutoff distance, in cells. Must not exceed 1.0: the
    /// neighbor query only visits an entity's own region, so interactions
    /// longer than one cell would silently be missed across boundaries.
    pub cutoff: f32,
    /// Upper bound on the per-pair repulsion strength, preventing extreme
    /// pushes between near-coincident entities.
    pub max_push: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_cols: 16,
            grid_rows: 16,
            damping: 0.98,
            repulsion: 0.05,
            cutoff: 1.0,
            max_push: 8.0,
        }
    }
}

/// Driver-side settings for the demo binary. These never affect the
/// deterministic core; two runs with the same `SimConfig`, seed and entity
/// count produce identical trajectories regardless of anything here.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DriverConfig {
    pub entity_count: usize,
    pub steps: u64,
    pub seed: u64,
    /// Where the final-state snapshot is written; empty disables it.
    pub snapshot_path: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            entity_count: 4096,
            steps: 600,
            seed: 0x9e3779b97f4a7c15,
            snapshot_path: "harrier_final.snap".to_string(),
        }
    }
}

/// Loads a RON config file, falling back to defaults when the file is
/// missing or malformed. The fallback is logged, never fatal: a missing
/// config means "run with the shipped tuning".
pub fn load_ron_or_default<T: DeserializeOwned + Default>(path: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => match ron::from_str::<T>(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path);
                config
            }
            Err(e) => {
                error!("Failed to parse {}: {}", path, e);
                error!("Using default config");
                T::default()
            }
        },
        Err(e) => {
            info!("Could not read {} ({}), using default config", path, e);
            T::default()
        }
    }
}
