//! WAL Replica
//!
//! Applies a primary's sequenced writes to the local WAL file in issue
//! order. Arrivals from the network may be reordered or duplicated:
//!
//! ```text
//!   received == current + 1  ──► apply, then drain contiguous pending writes
//!   received >  current + 1  ──► buffer in `pending`, report Buffered
//!   received <= current      ──► WalSequenceMismatch (stale replay)
//!   current == 0, received != 1 ► WalOutOfSync (needs a full resync)
//! ```
//!
//! A truncation starts a new epoch: the sequence resets to 0 and anything
//! buffered is discarded.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, VaultError};

use super::{WalFile, WalMessage};

/// Result of offering a write to the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The write and `drained` buffered successors were written to the file
    Applied { drained: usize },
    /// The write arrived ahead of a gap and is held in memory
    Buffered,
}

#[derive(Debug)]
struct PendingWrite {
    timestamp: i64,
    offset: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct ReplicaState {
    sequence: i64,
    timestamp: i64,
    pending: BTreeMap<i64, PendingWrite>,
}

/// Follower end of one replicated WAL stream
pub struct WalReplica {
    file: Arc<WalFile>,
    state: Mutex<ReplicaState>,
}

impl WalReplica {
    pub fn new(file: Arc<WalFile>) -> Self {
        Self {
            file,
            state: Mutex::new(ReplicaState::default()),
        }
    }

    /// Open the WAL file at `path` and wrap it in an uninitialized replica
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(WalFile::open(path)?)))
    }

    pub fn file(&self) -> &Arc<WalFile> {
        &self.file
    }

    /// Offer a sequenced write
    pub fn write_at(
        &self,
        sequence: i64,
        timestamp: i64,
        offset: u64,
        data: &[u8],
    ) -> Result<ApplyOutcome> {
        let mut state = self.state.lock();

        if state.sequence == 0 && sequence != 1 {
            return Err(VaultError::WalOutOfSync { sequence });
        }
        if sequence <= state.sequence {
            return Err(VaultError::WalSequenceMismatch {
                current: state.sequence,
                received: sequence,
            });
        }
        if sequence > state.sequence + 1 {
            state.pending.entry(sequence).or_insert_with(|| PendingWrite {
                timestamp,
                offset,
                data: data.to_vec(),
            });
            tracing::trace!(
                "Buffered WAL write {} (current {}, {} pending)",
                sequence,
                state.sequence,
                state.pending.len()
            );
            return Ok(ApplyOutcome::Buffered);
        }

        self.file.write_at(data, offset)?;
        state.sequence = sequence;
        state.timestamp = timestamp;
        state.pending.remove(&sequence);

        // A failed drain leaves the successor buffered; this write is applied regardless
        let drained = self.drain(&mut state);
        Ok(ApplyOutcome::Applied { drained })
    }

    /// Truncate the file and begin a new epoch
    pub fn truncate(&self, size: u64, sequence: i64, timestamp: i64) -> Result<()> {
        let mut state = self.state.lock();
        self.file.truncate(size)?;

        let discarded = state.pending.len();
        state.sequence = 0;
        state.timestamp = timestamp;
        state.pending.clear();

        tracing::debug!(
            "WAL truncated to {} bytes at sequence {} ({} pending writes discarded)",
            size,
            sequence,
            discarded
        );
        Ok(())
    }

    /// Apply a decoded replication message
    pub fn apply(&self, message: &WalMessage) -> Result<ApplyOutcome> {
        match message {
            WalMessage::Write {
                sequence,
                timestamp,
                offset,
                data,
            } => self.write_at(*sequence, *timestamp, *offset, data),
            WalMessage::Truncate {
                size,
                sequence,
                timestamp,
            } => {
                self.truncate(*size, *sequence, *timestamp)?;
                Ok(ApplyOutcome::Applied { drained: 0 })
            }
        }
    }

    /// Last applied sequence; 0 before the first write of an epoch
    pub fn sequence(&self) -> i64 {
        self.state.lock().sequence
    }

    /// Timestamp of the last applied mutation
    pub fn timestamp(&self) -> i64 {
        self.state.lock().timestamp
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync()?;
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn drain(&self, state: &mut ReplicaState) -> usize {
        let mut drained = 0;
        while let Some(write) = state.pending.remove(&(state.sequence + 1)) {
            if let Err(e) = self.file.write_at(&write.data, write.offset) {
                tracing::warn!(
                    "Buffered WAL write {} failed to apply, awaiting retransmit: {}",
                    state.sequence + 1,
                    e
                );
                state.pending.insert(state.sequence + 1, write);
                break;
            }
            state.sequence += 1;
            state.timestamp = write.timestamp;
            drained += 1;
        }
        drained
    }
}
