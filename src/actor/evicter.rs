use super::Actor;
use crate::error::{SimError, SimResult};
use crate::mailbox::{ActorId, Mailbox, Message, MessageBus};
use crate::memory::FrameTable;
use crate::stats::Statistics;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvicterState {
    /// Blocked on the mailbox, waiting for a wake-up.
    Idle,
    /// Sweeping the table.
    Reclaiming,
}

/// Reclaims frames when the manager finds the table full.
///
/// A sweep frees every index from `capacity - 1` down to `floor`; frames
/// below the floor are always retained. The manager is told the table is no
/// longer full right after the first index is cleared, so it can continue
/// while the rest of the sweep runs.
pub struct Evicter {
    mailbox: Mailbox,
    bus: MessageBus,
    table: Arc<FrameTable>,
    stats: Arc<Statistics>,
    floor: usize,
    state: EvicterState,
}

impl Evicter {
    pub fn new(
        mailbox: Mailbox,
        bus: MessageBus,
        table: Arc<FrameTable>,
        stats: Arc<Statistics>,
        floor: usize,
    ) -> Self {
        Self {
            mailbox,
            bus,
            table,
            stats,
            floor,
            state: EvicterState::Idle,
        }
    }

    pub fn state(&self) -> EvicterState {
        self.state
    }

    /// Runs one sweep and returns how many loaded frames it freed.
    ///
    /// The occupied count only shrinks for frames that were loaded, so a
    /// sweep over slots that are already free leaves it untouched.
    pub fn sweep(&mut self) -> SimResult<u64> {
        let mut reclaimed = 0;
        let indices = (self.floor..self.table.capacity()).rev();

        for (visited, index) in indices.enumerate() {
            if self.table.free_and_shrink(index)? {
                reclaimed += 1;
            }
            if visited == 0 {
                self.bus.send(ActorId::Manager, Message::TableNotFull)?;
            }
        }

        debug!(
            "Sweep reclaimed {} frames, {} still occupied",
            reclaimed,
            self.table.occupied_count()
        );
        self.stats.record_sweep(reclaimed);
        Ok(reclaimed)
    }
}

impl Actor for Evicter {
    fn id(&self) -> ActorId {
        ActorId::Evicter
    }

    fn run(mut self) -> SimResult<()> {
        debug!("Evicter started");
        loop {
            match self.state {
                EvicterState::Idle => match self.mailbox.recv()? {
                    Message::WakeEvicter => self.state = EvicterState::Reclaiming,
                    Message::Shutdown => break,
                    message => {
                        return Err(SimError::UnexpectedMessage {
                            actor: ActorId::Evicter,
                            message,
                        })
                    }
                },
                EvicterState::Reclaiming => {
                    self.sweep()?;
                    self.state = EvicterState::Idle;
                }
            }
        }
        debug!("Evicter stopped");
        Ok(())
    }
}
