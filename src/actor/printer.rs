use super::Actor;
use crate::error::{SimError, SimResult};
use crate::mailbox::{ActorId, Mailbox, Message};
use crate::memory::{FrameTable, Snapshot};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Prints a snapshot of the frame table at a fixed interval.
///
/// Each frame is rendered as `index|symbol` on its own line, where `-` is a
/// free frame, `0` a clean one and `1` a dirty one.
pub struct Printer {
    mailbox: Mailbox,
    table: Arc<FrameTable>,
    interval: Duration,
}

impl Printer {
    pub fn new(mailbox: Mailbox, table: Arc<FrameTable>, interval: Duration) -> Self {
        Self {
            mailbox,
            table,
            interval,
        }
    }
}

/// One `index|symbol` line per frame, then two blank lines.
fn render(snapshot: &Snapshot) -> String {
    format!("{}\n\n", snapshot)
}

impl Actor for Printer {
    fn id(&self) -> ActorId {
        ActorId::Printer
    }

    fn run(mut self) -> SimResult<()> {
        debug!("Printer started");
        loop {
            print!("{}", render(&self.table.snapshot()));

            match self.mailbox.recv_timeout(self.interval)? {
                None => continue,
                Some(Message::Shutdown) => break,
                Some(message) => {
                    return Err(SimError::UnexpectedMessage {
                        actor: ActorId::Printer,
                        message,
                    })
                }
            }
        }
        debug!("Printer stopped");
        Ok(())
    }
}
