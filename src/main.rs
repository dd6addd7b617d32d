//! vmsim - virtual-memory manager simulation

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use log::{info, warn};
use std::time::Duration;
use vmsim::config::{DEFAULT_CAPACITY, DEFAULT_EVICTION_FLOOR};
use vmsim::{SimConfig, Simulation};

/// vmsim - Simulates clients, a memory manager, a disk and an evicter sharing a frame table
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of frames in the table
    #[arg(short = 'n', long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Probability that a client access is a write
    #[arg(short, long, default_value = "0.5")]
    write_rate: f64,

    /// Probability that an access to a non-empty table hits
    #[arg(short = 'r', long, default_value = "0.5")]
    hit_rate: f64,

    /// Simulation time in milliseconds
    #[arg(short = 't', long, default_value = "1000")]
    sim_time_ms: u64,

    /// Time between frame table snapshots in milliseconds
    #[arg(long, default_value = "100")]
    snapshot_interval_ms: u64,

    /// Memory write time in nanoseconds
    #[arg(long, default_value = "1000")]
    mem_write_ns: u64,

    /// Disk access time in nanoseconds
    #[arg(long, default_value = "1000000")]
    disk_access_ns: u64,

    /// Pause before each client access in nanoseconds
    #[arg(long, default_value = "10000")]
    inter_access_ns: u64,

    /// Lowest frame index the evicter reclaims
    #[arg(short = 'f', long, default_value_t = DEFAULT_EVICTION_FLOOR)]
    eviction_floor: usize,

    /// Seed for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn to_config(&self) -> SimConfig {
        SimConfig {
            capacity: self.capacity,
            write_rate: self.write_rate,
            hit_rate: self.hit_rate,
            sim_time: Duration::from_millis(self.sim_time_ms),
            snapshot_interval: Duration::from_millis(self.snapshot_interval_ms),
            mem_write_latency: Duration::from_nanos(self.mem_write_ns),
            disk_latency: Duration::from_nanos(self.disk_access_ns),
            inter_access_interval: Duration::from_nanos(self.inter_access_ns),
            eviction_floor: self.eviction_floor,
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = args.to_config();
    let sim_time = config.sim_time;
    let simulation = Simulation::start(config).context("Failed to start simulation")?;
    let failure = simulation.failure_notifier();

    tokio::select! {
        _ = tokio::time::sleep(sim_time) => {
            info!("Simulation time elapsed");
        }
        _ = failure.notified() => {
            warn!("An actor failed, stopping simulation");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Interrupted, stopping simulation");
        }
    }

    // Joining the actor threads blocks
    let report = tokio::task::spawn_blocking(move || simulation.stop())
        .await
        .context("Simulation shutdown task failed")?
        .context("Simulation failed")?;

    println!("Successfully finished sim");
    println!("{}", report);

    Ok(())
}
