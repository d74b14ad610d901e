//! WAL Sequencer
//!
//! Primary side of replication: stamps each local mutation with the next
//! sequence number and a timestamp, producing the message followers apply.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::WalMessage;

#[derive(Debug, Default)]
struct SequencerState {
    sequence: i64,
    timestamp: i64,
}

/// Issues sequenced WAL messages for one replicated stream
#[derive(Debug, Default)]
pub struct WalSequencer {
    state: Mutex<SequencerState>,
}

impl WalSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message for a write of `data` at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> WalMessage {
        let mut state = self.state.lock();
        state.sequence += 1;
        state.timestamp = next_timestamp(state.timestamp);
        WalMessage::Write {
            sequence: state.sequence,
            timestamp: state.timestamp,
            offset,
            data: data.to_vec(),
        }
    }

    /// Message for a truncation. The next write starts a new epoch at 1.
    pub fn truncate(&self, size: u64) -> WalMessage {
        let mut state = self.state.lock();
        let sequence = state.sequence + 1;
        state.sequence = 0;
        state.timestamp = next_timestamp(state.timestamp);
        WalMessage::Truncate {
            size,
            sequence,
            timestamp: state.timestamp,
        }
    }

    /// Sequence of the last issued write in this epoch
    pub fn sequence(&self) -> i64 {
        self.state.lock().sequence
    }
}

/// Wall-clock millis, never going backwards relative to `previous`
fn next_timestamp(previous: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    now.max(previous)
}
