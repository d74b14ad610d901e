//! Write-Ahead Log (WAL) Replication Module
//!
//! Mirrors a primary's WAL file onto followers.
//!
//! ## Responsibilities
//! - `WalSequencer` numbers each mutation on the primary
//! - `WalMessage` carries a mutation, CRC32-protected, over any transport
//! - `WalReplica` applies messages in strict sequence order on the follower
//! - `WalFile` holds the follower's bytes and syncs them periodically
//!
//! ## Flow
//! ```text
//! ┌──────────────┐  WalMessage   ┌──────────────┐  write_at   ┌─────────┐
//! │ WalSequencer │ ────────────► │  WalReplica  │ ──────────► │ WalFile │
//! │  (primary)   │  (any order)  │  (reorders)  │  (in order) │         │
//! └──────────────┘               └──────────────┘             └─────────┘
//! ```

mod file;
mod message;
mod replica;
mod sequencer;

pub use file::WalFile;
pub use message::WalMessage;
pub use replica::{ApplyOutcome, WalReplica};
pub use sequencer::WalSequencer;
