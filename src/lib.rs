//! Deterministic fixed-point particle simulation.
//!
//! All simulation state lives in fixed-point types with explicit bit
//! layouts, so a run is bit-reproducible across platforms, architectures
//! and optimization levels. Positions are split into a coarse region key
//! and a fine in-cell offset; the region partition built from the coarse
//! half gives every entity cheap access to its neighbors, and the split
//! representation halves per-entity position storage along the way.
//!
//! The crate is organized leaf-first: [`fixed`] (scalar layouts, vectors,
//! mixed-precision rules) has no dependencies, [`region`] builds the
//! split-position model on top of it, [`partition`] keys off region keys,
//! and [`sim`] runs the double-buffered step over all of them.

pub mod config;
pub mod fixed;
pub mod partition;
pub mod region;
pub mod sim;
pub mod snapshot;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Conditionally log messages based on step interval when the perf_stats
/// feature is enabled.
///
/// This macro logs a message every 100 steps. When the perf_stats feature is
/// disabled, this macro compiles to nothing - zero runtime cost. Even the
/// arguments are not evaluated.
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($step:expr, $($arg:tt)*) => {
        if $step % 100 == 0 {
            tracing::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($step:expr, $($arg:tt)*) => {};
}
