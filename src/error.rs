//! Simulation error types.

use crate::mailbox::{ActorId, Message};
use thiserror::Error;

/// Errors that can stop the simulation.
///
/// Every variant is fatal: actors depend on each other, so one failing actor
/// brings the whole simulation down rather than leaving the frame table in an
/// undefined state.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Mailbox of {0} is closed")]
    MailboxClosed(ActorId),

    #[error("{actor} received unexpected message: {message:?}")]
    UnexpectedMessage { actor: ActorId, message: Message },

    #[error("Frame index {index} out of range (capacity: {capacity})")]
    FrameOutOfRange { index: usize, capacity: usize },

    #[error("Frame {0} is not loaded")]
    FrameNotLoaded(usize),

    #[error("Frame {0} is already occupied")]
    FrameOccupied(usize),

    #[error("Frame table is full")]
    TableFull,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn {actor} thread: {source}")]
    Spawn {
        actor: ActorId,
        #[source]
        source: std::io::Error,
    },

    #[error("Actor {0} panicked")]
    ActorPanicked(ActorId),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
