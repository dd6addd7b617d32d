pub mod actor;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod memory;
pub mod simulation;
pub mod stats;

pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use simulation::{Simulation, SimulationReport};
