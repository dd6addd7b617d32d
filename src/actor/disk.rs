use super::Actor;
use crate::error::{SimError, SimResult};
use crate::mailbox::{ActorId, Mailbox, Message, MessageBus};
use log::{debug, trace};
use std::thread;
use std::time::Duration;

/// Stateless relay modelling the latency of a page-in.
pub struct DiskService {
    mailbox: Mailbox,
    bus: MessageBus,
    latency: Duration,
}

impl DiskService {
    pub fn new(mailbox: Mailbox, bus: MessageBus, latency: Duration) -> Self {
        Self {
            mailbox,
            bus,
            latency,
        }
    }
}

impl Actor for DiskService {
    fn id(&self) -> ActorId {
        ActorId::Disk
    }

    fn run(mut self) -> SimResult<()> {
        debug!("Disk started");
        loop {
            match self.mailbox.recv()? {
                Message::PageIn { requester } => {
                    thread::sleep(self.latency);
                    trace!("Page-in for {} done", requester);
                    self.bus.send(
                        requester,
                        Message::Ack {
                            sender: ActorId::Disk,
                        },
                    )?;
                }
                Message::Shutdown => break,
                message => {
                    return Err(SimError::UnexpectedMessage {
                        actor: ActorId::Disk,
                        message,
                    })
                }
            }
        }
        debug!("Disk stopped");
        Ok(())
    }
}
