//! Per-actor mailboxes and the bus that routes messages between them.
//!
//! Every actor owns exactly one [`Mailbox`], the receiving end of an unbounded
//! FIFO channel. Everybody else reaches it through the shared [`MessageBus`],
//! which only hands out send access.

use crate::error::{SimError, SimResult};
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Identity of an actor, used both as mailbox address and as the
/// requester/sender tag carried by in-flight messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorId {
    Disk,
    Manager,
    Evicter,
    Client1,
    Client2,
    Printer,
}

impl ActorId {
    pub const ALL: [ActorId; 6] = [
        ActorId::Disk,
        ActorId::Manager,
        ActorId::Evicter,
        ActorId::Client1,
        ActorId::Client2,
        ActorId::Printer,
    ];

    pub const CLIENTS: [ActorId; 2] = [ActorId::Client1, ActorId::Client2];

    pub fn is_client(&self) -> bool {
        matches!(self, ActorId::Client1 | ActorId::Client2)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorId::Disk => "disk",
            ActorId::Manager => "manager",
            ActorId::Evicter => "evicter",
            ActorId::Client1 => "client-1",
            ActorId::Client2 => "client-2",
            ActorId::Printer => "printer",
        };
        f.write_str(name)
    }
}

/// Kind of memory access a client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Everything that travels between actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client asks the manager for a memory access.
    Access {
        kind: AccessKind,
        requester: ActorId,
    },
    /// Manager asks the disk to page in a frame.
    PageIn { requester: ActorId },
    /// Completion of a request, tagged with whoever completed it.
    Ack { sender: ActorId },
    /// Manager wakes the evicter because the table is full.
    WakeEvicter,
    /// Evicter tells the manager a slot has been reclaimed.
    TableNotFull,
    /// Simulation-wide termination signal.
    Shutdown,
}

/// Send side of every mailbox in the simulation.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    senders: HashMap<ActorId, Sender<Message>>,
    shutting_down: AtomicBool,
}

impl MessageBus {
    /// Creates one mailbox per [`ActorId`] and the bus addressing them.
    pub fn new() -> (Self, Mailboxes) {
        let mut senders = HashMap::with_capacity(ActorId::ALL.len());
        let mut mailboxes = HashMap::with_capacity(ActorId::ALL.len());

        for owner in ActorId::ALL {
            let (sender, receiver) = mpsc::channel();
            senders.insert(owner, sender);
            mailboxes.insert(
                owner,
                Mailbox {
                    owner,
                    receiver,
                    deferred: VecDeque::new(),
                },
            );
        }

        let bus = Self {
            inner: Arc::new(BusInner {
                senders,
                shutting_down: AtomicBool::new(false),
            }),
        };
        (bus, Mailboxes { mailboxes })
    }

    /// Queues `message` in the mailbox of `to`. Never blocks.
    ///
    /// Fails only if the destination mailbox is gone. Once shutdown has begun,
    /// messages for actors that already exited are dropped instead.
    pub fn send(&self, to: ActorId, message: Message) -> SimResult<()> {
        trace!("{} <- {:?}", to, message);
        let sender = self
            .inner
            .senders
            .get(&to)
            .ok_or(SimError::MailboxClosed(to))?;

        match sender.send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::SendError(message)) if self.is_shutting_down() => {
                trace!("Dropping {:?} for exited actor {}", message, to);
                Ok(())
            }
            Err(_) => Err(SimError::MailboxClosed(to)),
        }
    }

    /// Broadcasts [`Message::Shutdown`] to every mailbox. Only the first call
    /// has any effect.
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Broadcasting shutdown to all actors");
        for sender in self.inner.senders.values() {
            let _ = sender.send(Message::Shutdown);
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}

/// Receive side of one actor's channel.
pub struct Mailbox {
    owner: ActorId,
    receiver: Receiver<Message>,
    /// Messages set aside by [`Mailbox::recv_where`], in arrival order.
    deferred: VecDeque<Message>,
}

impl Mailbox {
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Blocks until the next message arrives. Deferred messages come first.
    pub fn recv(&mut self) -> SimResult<Message> {
        if let Some(message) = self.deferred.pop_front() {
            return Ok(message);
        }
        self.receiver
            .recv()
            .map_err(|_| SimError::MailboxClosed(self.owner))
    }

    /// Blocks until a message accepted by `wanted` (or a shutdown) arrives.
    ///
    /// Anything else received in the meantime is deferred and handed out by
    /// later calls to [`Mailbox::recv`] in arrival order.
    pub fn recv_where<F>(&mut self, wanted: F) -> SimResult<Message>
    where
        F: Fn(&Message) -> bool,
    {
        if let Some(pos) = self.deferred.iter().position(|m| wanted(m)) {
            if let Some(message) = self.deferred.remove(pos) {
                return Ok(message);
            }
        }

        loop {
            let message = self
                .receiver
                .recv()
                .map_err(|_| SimError::MailboxClosed(self.owner))?;
            if message == Message::Shutdown || wanted(&message) {
                return Ok(message);
            }
            trace!("{} deferring {:?}", self.owner, message);
            self.deferred.push_back(message);
        }
    }

    /// Like [`Mailbox::recv`], but gives up after `timeout` and returns `None`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> SimResult<Option<Message>> {
        if let Some(message) = self.deferred.pop_front() {
            return Ok(Some(message));
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SimError::MailboxClosed(self.owner)),
        }
    }

    /// Number of messages waiting in the deferred queue.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}

/// Mailboxes created by [`MessageBus::new`], waiting to be claimed by their
/// owners.
pub struct Mailboxes {
    mailboxes: HashMap<ActorId, Mailbox>,
}

impl Mailboxes {
    /// Hands out the mailbox of `owner`. Each mailbox can be taken once.
    pub fn take(&mut self, owner: ActorId) -> Option<Mailbox> {
        self.mailboxes.remove(&owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(kind: AccessKind, requester: ActorId) -> Message {
        Message::Access { kind, requester }
    }

    #[test]
    fn test_fifo_delivery() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        let mut manager = mailboxes.take(ActorId::Manager).unwrap();

        bus.send(ActorId::Manager, access(AccessKind::Read, ActorId::Client1))?;
        bus.send(ActorId::Manager, access(AccessKind::Write, ActorId::Client2))?;
        bus.send(ActorId::Manager, Message::TableNotFull)?;

        assert_eq!(manager.recv()?, access(AccessKind::Read, ActorId::Client1));
        assert_eq!(manager.recv()?, access(AccessKind::Write, ActorId::Client2));
        assert_eq!(manager.recv()?, Message::TableNotFull);
        Ok(())
    }

    #[test]
    fn test_take_once() {
        let (_bus, mut mailboxes) = MessageBus::new();
        let mailbox = mailboxes.take(ActorId::Disk).unwrap();
        assert_eq!(mailbox.owner(), ActorId::Disk);
        assert!(mailboxes.take(ActorId::Disk).is_none());
    }

    #[test]
    fn test_recv_where_defers_others() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        let mut manager = mailboxes.take(ActorId::Manager).unwrap();

        bus.send(ActorId::Manager, access(AccessKind::Read, ActorId::Client2))?;
        bus.send(ActorId::Manager, access(AccessKind::Write, ActorId::Client1))?;
        bus.send(
            ActorId::Manager,
            Message::Ack {
                sender: ActorId::Disk,
            },
        )?;

        let reply = manager.recv_where(|m| {
            matches!(
                m,
                Message::Ack {
                    sender: ActorId::Disk
                }
            )
        })?;
        assert_eq!(
            reply,
            Message::Ack {
                sender: ActorId::Disk
            }
        );
        assert_eq!(manager.deferred_len(), 2);

        // Deferred requests come back in arrival order
        assert_eq!(manager.recv()?, access(AccessKind::Read, ActorId::Client2));
        assert_eq!(manager.recv()?, access(AccessKind::Write, ActorId::Client1));
        assert_eq!(manager.deferred_len(), 0);
        Ok(())
    }

    #[test]
    fn test_recv_where_checks_deferred_first() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        let mut manager = mailboxes.take(ActorId::Manager).unwrap();

        bus.send(ActorId::Manager, Message::TableNotFull)?;
        bus.send(
            ActorId::Manager,
            Message::Ack {
                sender: ActorId::Disk,
            },
        )?;

        manager.recv_where(|m| matches!(m, Message::Ack { .. }))?;
        assert_eq!(manager.deferred_len(), 1);

        let message = manager.recv_where(|m| *m == Message::TableNotFull)?;
        assert_eq!(message, Message::TableNotFull);
        assert_eq!(manager.deferred_len(), 0);
        Ok(())
    }

    #[test]
    fn test_recv_where_returns_on_shutdown() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        let mut manager = mailboxes.take(ActorId::Manager).unwrap();

        bus.send(ActorId::Manager, access(AccessKind::Read, ActorId::Client1))?;
        bus.shutdown();

        let message = manager.recv_where(|m| *m == Message::TableNotFull)?;
        assert_eq!(message, Message::Shutdown);
        assert_eq!(manager.deferred_len(), 1);
        Ok(())
    }

    #[test]
    fn test_send_to_dropped_mailbox() {
        let (bus, mut mailboxes) = MessageBus::new();
        drop(mailboxes.take(ActorId::Client1));

        let result = bus.send(
            ActorId::Client1,
            Message::Ack {
                sender: ActorId::Manager,
            },
        );
        assert!(matches!(result, Err(SimError::MailboxClosed(ActorId::Client1))));
    }

    #[test]
    fn test_send_after_shutdown_is_dropped() {
        let (bus, mut mailboxes) = MessageBus::new();
        drop(mailboxes.take(ActorId::Client1));
        bus.shutdown();

        assert!(bus.is_shutting_down());
        assert!(bus
            .send(
                ActorId::Client1,
                Message::Ack {
                    sender: ActorId::Manager,
                },
            )
            .is_ok());
    }

    #[test]
    fn test_shutdown_reaches_everyone_once() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        bus.shutdown();
        bus.shutdown();

        for owner in ActorId::ALL {
            let mut mailbox = mailboxes.take(owner).unwrap();
            assert_eq!(mailbox.recv()?, Message::Shutdown);
            assert_eq!(mailbox.recv_timeout(Duration::from_millis(1))?, None);
        }
        Ok(())
    }

    #[test]
    fn test_recv_timeout() -> SimResult<()> {
        let (bus, mut mailboxes) = MessageBus::new();
        let mut printer = mailboxes.take(ActorId::Printer).unwrap();

        assert_eq!(printer.recv_timeout(Duration::from_millis(5))?, None);
        bus.send(ActorId::Printer, Message::Shutdown)?;
        assert_eq!(
            printer.recv_timeout(Duration::from_millis(5))?,
            Some(Message::Shutdown)
        );
        Ok(())
    }

    #[test]
    fn test_actor_id_display() {
        assert_eq!(ActorId::Client1.to_string(), "client-1");
        assert_eq!(ActorId::Manager.to_string(), "manager");
        assert!(ActorId::Client2.is_client());
        assert!(!ActorId::Disk.is_client());
    }
}
