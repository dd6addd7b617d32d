//! The actors taking part in the simulation.
//!
//! Each actor runs on its own thread, owns its mailbox and talks to the
//! others only through the [`MessageBus`](crate::mailbox::MessageBus).
//!
//! - **MemoryManager**: hit/miss decisions, page-ins, eviction trigger, acks
//! - **Evicter**: bulk-reclaims frames when the manager finds the table full
//! - **DiskService**: models page-in latency
//! - **Client**: issues randomized reads and writes, one at a time
//! - **Printer**: periodically renders a snapshot of the frame table

pub mod client;
pub mod disk;
pub mod evicter;
pub mod manager;
pub mod oracle;
pub mod printer;

use crate::error::SimResult;
use crate::mailbox::ActorId;

pub use client::Client;
pub use disk::DiskService;
pub use evicter::{Evicter, EvicterState};
pub use manager::MemoryManager;
pub use oracle::{AccessOracle, RandomOracle, ScriptedOracle};
pub use printer::Printer;

/// A simulation participant with its own thread of control.
pub trait Actor: Send + 'static {
    /// Identity of the mailbox this actor consumes.
    fn id(&self) -> ActorId;

    /// Serves messages until a shutdown arrives or something fatal happens.
    fn run(self) -> SimResult<()>;
}
