//! In-memory storage for the Splitledger engine.
//!
//! This crate provides:
//! - [`MemoryLedger`], a thread-safe implementation of the directory, history
//!   and store traits from `splitledger-core`
//! - JSON snapshot loading and replay through the ledger service

pub mod memory;
pub mod snapshot;

pub use memory::{FriendshipStatus, GroupRecord, MemoryLedger};
pub use snapshot::{Rejection, RecordKind, Replay, Snapshot, SnapshotError};
