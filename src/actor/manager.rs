use super::oracle::AccessOracle;
use super::Actor;
use crate::error::{SimError, SimResult};
use crate::mailbox::{AccessKind, ActorId, Mailbox, Message, MessageBus};
use crate::memory::FrameTable;
use crate::stats::Statistics;
use log::{debug, trace};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Whether the manager keeps serving after handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The single decision authority of the simulation.
///
/// For every client access it decides hit or miss, pages frames in through
/// the disk, wakes the evicter when the table is full and acknowledges the
/// client exactly once. The table lock is only taken inside [`FrameTable`]
/// calls, so it is never held while the manager waits on its mailbox.
pub struct MemoryManager {
    mailbox: Mailbox,
    bus: MessageBus,
    table: Arc<FrameTable>,
    oracle: Box<dyn AccessOracle>,
    stats: Arc<Statistics>,
    mem_write_latency: Duration,
}

impl MemoryManager {
    pub fn new(
        mailbox: Mailbox,
        bus: MessageBus,
        table: Arc<FrameTable>,
        oracle: Box<dyn AccessOracle>,
        stats: Arc<Statistics>,
        mem_write_latency: Duration,
    ) -> Self {
        Self {
            mailbox,
            bus,
            table,
            oracle,
            stats,
            mem_write_latency,
        }
    }

    fn serve(&mut self, kind: AccessKind, requester: ActorId) -> SimResult<Flow> {
        if !self.table.is_empty() && self.oracle.is_hit() {
            return self.serve_hit(kind, requester);
        }

        debug!("{} {:?} missed (page fault)", requester, kind);
        self.stats.record_miss();

        if self.table.is_full() && self.wait_for_eviction()? == Flow::Stop {
            return Ok(Flow::Stop);
        }
        if self.page_in()? == Flow::Stop {
            return Ok(Flow::Stop);
        }

        let index = self.table.install_at_free_slot()?;
        trace!("Installed frame {} for {}", index, requester);
        self.acknowledge(requester)?;
        Ok(Flow::Continue)
    }

    fn serve_hit(&mut self, kind: AccessKind, requester: ActorId) -> SimResult<Flow> {
        let write = kind == AccessKind::Write;
        if write {
            thread::sleep(self.mem_write_latency);
            let oracle = &mut self.oracle;
            match self.table.mark_random_dirty(|loaded| oracle.choose_frame(loaded))? {
                Some(index) => trace!("Write hit dirtied frame {}", index),
                None => debug!("Table drained before the write hit of {} landed", requester),
            }
        }

        debug!("{} {:?} hit", requester, kind);
        self.stats.record_hit(write);
        self.acknowledge(requester)?;
        Ok(Flow::Continue)
    }

    /// Wakes the evicter and blocks until it reports a reclaimed slot.
    fn wait_for_eviction(&mut self) -> SimResult<Flow> {
        debug!("Table full, waking evicter");
        self.bus.send(ActorId::Evicter, Message::WakeEvicter)?;

        match self.mailbox.recv_where(|m| *m == Message::TableNotFull)? {
            Message::Shutdown => Ok(Flow::Stop),
            _ => {
                trace!("Evicter reported table not full");
                Ok(Flow::Continue)
            }
        }
    }

    /// Asks the disk for a page and blocks until it completes.
    fn page_in(&mut self) -> SimResult<Flow> {
        self.bus.send(
            ActorId::Disk,
            Message::PageIn {
                requester: ActorId::Manager,
            },
        )?;
        self.stats.record_page_in();

        let reply = self.mailbox.recv_where(|m| {
            matches!(
                m,
                Message::Ack {
                    sender: ActorId::Disk
                }
            )
        })?;
        match reply {
            Message::Shutdown => Ok(Flow::Stop),
            _ => Ok(Flow::Continue),
        }
    }

    fn acknowledge(&self, requester: ActorId) -> SimResult<()> {
        self.bus.send(
            requester,
            Message::Ack {
                sender: ActorId::Manager,
            },
        )?;
        self.stats.record_ack_sent();
        Ok(())
    }
}

impl Actor for MemoryManager {
    fn id(&self) -> ActorId {
        ActorId::Manager
    }

    fn run(mut self) -> SimResult<()> {
        debug!("Manager started");
        loop {
            match self.mailbox.recv()? {
                Message::Access { kind, requester } => {
                    if self.serve(kind, requester)? == Flow::Stop {
                        break;
                    }
                }
                Message::Shutdown => break,
                message => {
                    return Err(SimError::UnexpectedMessage {
                        actor: ActorId::Manager,
                        message,
                    })
                }
            }
        }
        debug!("Manager stopped");
        Ok(())
    }
}
