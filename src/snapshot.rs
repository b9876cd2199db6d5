use std::fs::File;
use std::io::{BufReader, BufWriter};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SimConfig;
use crate::region::CellKey;
use crate::sim::Particle;

pub const SNAPSHOT_VERSION: u32 = 1;

/// The full deterministic state of a run: everything needed to resume the
/// trajectory bit-for-bit. Forces are deliberately absent, they are
/// recomputed from scratch at the start of every step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimSnapshot {
    pub version: u32,
    pub steps: u64,
    pub config: SimConfig,
    pub particles: Vec<Particle>,
    pub keys: Vec<CellKey>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("unsupported snapshot version {found}")]
    VersionMismatch { found: u32 },
}

pub fn save_snapshot(path: &str, snapshot: &SimSnapshot) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, snapshot)?;
    encoder.finish()?;
    Ok(())
}

pub fn load_snapshot(path: &str) -> Result<SimSnapshot, SnapshotError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut decoder = ZlibDecoder::new(reader);
    let snapshot: SimSnapshot = bincode::deserialize_from(&mut decoder)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}
