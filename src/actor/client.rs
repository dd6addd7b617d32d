use super::oracle::seeded_rng;
use super::Actor;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::mailbox::{AccessKind, ActorId, Mailbox, Message, MessageBus};
use crate::stats::Statistics;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Issues randomized memory accesses, one at a time.
///
/// A client never sends a new request before the previous one was
/// acknowledged, so it has at most one request in flight.
pub struct Client {
    id: ActorId,
    mailbox: Mailbox,
    bus: MessageBus,
    stats: Arc<Statistics>,
    rng: StdRng,
    write_rate: f64,
    interval: Duration,
}

impl Client {
    pub fn new(
        mailbox: Mailbox,
        bus: MessageBus,
        stats: Arc<Statistics>,
        config: &SimConfig,
    ) -> Self {
        let id = mailbox.owner();
        Self {
            id,
            mailbox,
            bus,
            stats,
            rng: seeded_rng(config.seed, id as u64 + 1),
            write_rate: config.write_rate,
            interval: config.inter_access_interval,
        }
    }

    /// Draws the kind of the next access.
    pub fn next_kind(&mut self) -> AccessKind {
        if self.rng.gen_bool(self.write_rate) {
            AccessKind::Write
        } else {
            AccessKind::Read
        }
    }

    /// Sends one access and blocks for its acknowledgement.
    ///
    /// Returns `false` if the simulation shut down before the ack arrived.
    pub fn access(&mut self, kind: AccessKind) -> SimResult<bool> {
        self.bus.send(
            ActorId::Manager,
            Message::Access {
                kind,
                requester: self.id,
            },
        )?;
        self.stats.record_request();
        trace!("{} sent {:?}", self.id, kind);

        match self.mailbox.recv()? {
            Message::Ack {
                sender: ActorId::Manager,
            } => {
                self.stats.record_ack_received();
                Ok(true)
            }
            Message::Shutdown => Ok(false),
            message => Err(SimError::UnexpectedMessage {
                actor: self.id,
                message,
            }),
        }
    }
}

impl Actor for Client {
    fn id(&self) -> ActorId {
        self.id
    }

    fn run(mut self) -> SimResult<()> {
        debug!("{} started", self.id);
        loop {
            thread::sleep(self.interval);
            let kind = self.next_kind();
            if !self.access(kind)? {
                break;
            }
        }
        debug!("{} stopped", self.id);
        Ok(())
    }
}
