//! Simulation parameters.

use crate::error::{SimError, SimResult};
use std::time::Duration;

/// Number of frames in the reference setup.
pub const DEFAULT_CAPACITY: usize = 5;
/// Lowest index the evicter sweeps down to; frames below it are retained.
pub const DEFAULT_EVICTION_FLOOR: usize = 2;

/// All knobs of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Number of frames in the table.
    pub capacity: usize,
    /// Probability that a client access is a write.
    pub write_rate: f64,
    /// Probability that an access to a non-empty table hits.
    pub hit_rate: f64,
    /// How long the binary lets the simulation run.
    pub sim_time: Duration,
    /// Pause between two printer snapshots.
    pub snapshot_interval: Duration,
    /// Latency of a write hit.
    pub mem_write_latency: Duration,
    /// Latency of a disk page-in.
    pub disk_latency: Duration,
    /// Pause a client takes before issuing each access.
    pub inter_access_interval: Duration,
    /// The evicter frees indices `capacity - 1` down to this one.
    pub eviction_floor: usize,
    /// Seed for all random draws; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            write_rate: 0.5,
            hit_rate: 0.5,
            sim_time: Duration::from_secs(1),
            snapshot_interval: Duration::from_millis(100),
            mem_write_latency: Duration::from_nanos(1_000),
            disk_latency: Duration::from_nanos(1_000_000),
            inter_access_interval: Duration::from_nanos(10_000),
            eviction_floor: DEFAULT_EVICTION_FLOOR,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Rejects parameter combinations the actors cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        if self.capacity == 0 {
            return Err(SimError::InvalidConfig(
                "capacity must be at least 1".to_string(),
            ));
        }
        for (name, rate) in [("write rate", self.write_rate), ("hit rate", self.hit_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        // A sweep that visits nothing would leave the manager waiting forever
        if self.eviction_floor >= self.capacity {
            return Err(SimError::InvalidConfig(format!(
                "eviction floor {} must be below capacity {}",
                self.eviction_floor, self.capacity
            )));
        }
        Ok(())
    }

    /// Configuration with every latency shrunk to zero, for fast tests.
    pub fn instant() -> Self {
        Self {
            snapshot_interval: Duration::from_millis(10),
            mem_write_latency: Duration::ZERO,
            disk_latency: Duration::ZERO,
            inter_access_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}
