//! Wiring and lifecycle of a simulation run.
//!
//! [`Simulation::start`] creates the frame table and the mailboxes, spawns one
//! thread per actor and hands back a handle. [`Simulation::stop`] broadcasts
//! the termination signal, joins every thread and reports what happened.
//!
//! If any actor fails, the whole simulation is shut down: actors depend on
//! each other, so a single stuck one would leave the rest blocked forever.

use crate::actor::{
    AccessOracle, Actor, Client, DiskService, Evicter, MemoryManager, Printer, RandomOracle,
};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::mailbox::{ActorId, Mailbox, Mailboxes, MessageBus};
use crate::memory::{FrameTable, Snapshot};
use crate::stats::{Statistics, StatisticsSnapshot};
use log::{debug, error, info};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::Notify;

/// Outcome of a finished simulation.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub stats: StatisticsSnapshot,
    pub final_snapshot: Snapshot,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.stats)?;
        writeln!(f, "final frame table:")?;
        write!(f, "{}", self.final_snapshot)
    }
}

/// Chooses which actors a [`Simulation`] spawns and how the manager decides.
pub struct SimulationBuilder {
    config: SimConfig,
    oracle: Option<Box<dyn AccessOracle>>,
    spawn_clients: bool,
    spawn_printer: bool,
}

impl SimulationBuilder {
    /// Replaces the default [`RandomOracle`].
    pub fn oracle(mut self, oracle: Box<dyn AccessOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Leaves the client mailboxes unclaimed so the caller can drive the
    /// clients by hand through [`Simulation::client`].
    pub fn without_clients(mut self) -> Self {
        self.spawn_clients = false;
        self
    }

    pub fn without_printer(mut self) -> Self {
        self.spawn_printer = false;
        self
    }

    pub fn start(self) -> SimResult<Simulation> {
        self.config.validate()?;

        let (bus, mailboxes) = MessageBus::new();
        let mut simulation = Simulation {
            table: Arc::new(FrameTable::new(self.config.capacity)),
            stats: Arc::new(Statistics::new()),
            failure: Arc::new(Notify::new()),
            handles: Vec::new(),
            config: self.config,
            bus,
            mailboxes,
        };

        let oracle = self.oracle.unwrap_or_else(|| {
            Box::new(RandomOracle::new(
                simulation.config.hit_rate,
                simulation.config.seed,
            )) as Box<dyn AccessOracle>
        });

        if let Err(e) = simulation.spawn_actors(oracle, self.spawn_clients, self.spawn_printer) {
            simulation.bus.shutdown();
            return Err(e);
        }

        info!(
            "Simulation started with {} frames (eviction floor {})",
            simulation.config.capacity, simulation.config.eviction_floor
        );
        Ok(simulation)
    }
}

/// Handle to a running simulation.
pub struct Simulation {
    config: SimConfig,
    bus: MessageBus,
    table: Arc<FrameTable>,
    stats: Arc<Statistics>,
    /// Mailboxes no spawned actor claimed.
    mailboxes: Mailboxes,
    handles: Vec<(ActorId, JoinHandle<SimResult<()>>)>,
    failure: Arc<Notify>,
}

impl Simulation {
    pub fn builder(config: SimConfig) -> SimulationBuilder {
        SimulationBuilder {
            config,
            oracle: None,
            spawn_clients: true,
            spawn_printer: true,
        }
    }

    /// Starts every actor with the default random oracle.
    pub fn start(config: SimConfig) -> SimResult<Self> {
        Self::builder(config).start()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<FrameTable> {
        &self.table
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn stats(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Claims a mailbox no actor was spawned for.
    pub fn take_mailbox(&mut self, owner: ActorId) -> Option<Mailbox> {
        self.mailboxes.take(owner)
    }

    /// Builds an unspawned client on an unclaimed client mailbox.
    pub fn client(&mut self, id: ActorId) -> Option<Client> {
        if !id.is_client() {
            return None;
        }
        let mailbox = self.mailboxes.take(id)?;
        Some(Client::new(
            mailbox,
            self.bus.clone(),
            self.stats.clone(),
            &self.config,
        ))
    }

    /// Notified once an actor fails and the simulation shuts itself down.
    pub fn failure_notifier(&self) -> Arc<Notify> {
        self.failure.clone()
    }

    /// Whether the termination signal has gone out, either from
    /// [`Simulation::stop`] or because an actor failed.
    pub fn is_shutting_down(&self) -> bool {
        self.bus.is_shutting_down()
    }

    /// Stops every actor and waits for them. Returns the first actor failure,
    /// if any.
    pub fn stop(self) -> SimResult<SimulationReport> {
        debug!("Stopping simulation");
        self.bus.shutdown();

        let mut first_error = None;
        for (id, handle) in self.handles {
            let result = handle.join().unwrap_or(Err(SimError::ActorPanicked(id)));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = SimulationReport {
            stats: self.stats.snapshot(),
            final_snapshot: self.table.snapshot(),
        };
        info!(
            "Simulation stopped after {} requests",
            report.stats.requests_sent
        );
        Ok(report)
    }

    fn spawn_actors(
        &mut self,
        oracle: Box<dyn AccessOracle>,
        spawn_clients: bool,
        spawn_printer: bool,
    ) -> SimResult<()> {
        let disk = DiskService::new(
            self.claim(ActorId::Disk)?,
            self.bus.clone(),
            self.config.disk_latency,
        );
        self.spawn(disk)?;

        let manager = MemoryManager::new(
            self.claim(ActorId::Manager)?,
            self.bus.clone(),
            self.table.clone(),
            oracle,
            self.stats.clone(),
            self.config.mem_write_latency,
        );
        self.spawn(manager)?;

        let evicter = Evicter::new(
            self.claim(ActorId::Evicter)?,
            self.bus.clone(),
            self.table.clone(),
            self.stats.clone(),
            self.config.eviction_floor,
        );
        self.spawn(evicter)?;

        if spawn_printer {
            let printer = Printer::new(
                self.claim(ActorId::Printer)?,
                self.table.clone(),
                self.config.snapshot_interval,
            );
            self.spawn(printer)?;
        }

        if spawn_clients {
            for id in ActorId::CLIENTS {
                let client = Client::new(
                    self.claim(id)?,
                    self.bus.clone(),
                    self.stats.clone(),
                    &self.config,
                );
                self.spawn(client)?;
            }
        }
        Ok(())
    }

    fn claim(&mut self, owner: ActorId) -> SimResult<Mailbox> {
        self.mailboxes
            .take(owner)
            .ok_or(SimError::MailboxClosed(owner))
    }

    /// Runs `actor` on a named thread. A failure or panic shuts the whole
    /// simulation down.
    fn spawn<A: Actor>(&mut self, actor: A) -> SimResult<()> {
        let id = actor.id();
        let bus = self.bus.clone();
        let failure = self.failure.clone();

        let handle = thread::Builder::new()
            .name(id.to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| actor.run()))
                    .unwrap_or(Err(SimError::ActorPanicked(id)));
                if let Err(e) = &result {
                    error!("{} failed: {}", id, e);
                    bus.shutdown();
                    failure.notify_one();
                }
                result
            })
            .map_err(|source| SimError::Spawn { actor: id, source })?;

        self.handles.push((id, handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimConfig {
            capacity: 2,
            eviction_floor: 5,
            ..SimConfig::instant()
        };
        assert!(matches!(
            Simulation::start(config),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_handle_only_for_clients() -> SimResult<()> {
        let mut simulation = Simulation::builder(SimConfig::instant())
            .without_clients()
            .without_printer()
            .start()?;

        assert!(simulation.client(ActorId::Disk).is_none());
        assert!(simulation.client(ActorId::Client1).is_some());
        // Already claimed
        assert!(simulation.client(ActorId::Client1).is_none());

        simulation.stop()?;
        Ok(())
    }

    #[test]
    fn test_stop_idle_simulation() -> SimResult<()> {
        let simulation = Simulation::builder(SimConfig::instant())
            .without_clients()
            .start()?;

        let report = simulation.stop()?;
        assert_eq!(report.stats, StatisticsSnapshot::default());
        assert!(report.final_snapshot.is_consistent());
        assert_eq!(report.final_snapshot.occupied_count(), 0);
        Ok(())
    }
}
