//! Simulated physical memory.
//!
//! - **FrameState**: what a single frame currently holds
//! - **FrameTable**: the fixed-capacity, mutex-protected table shared by the
//!   manager, the evicter and the printer
//! - **Snapshot**: a consistent copy of the table for rendering

pub mod frame;
pub mod frame_table;

pub use frame::FrameState;
pub use frame_table::{FrameTable, Snapshot};
