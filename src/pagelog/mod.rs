//! Page Log Module
//!
//! Durable, versioned storage of page contents, independent of any page's
//! current live state. Backs point-in-time reads of a database.
//!
//! ## Responsibilities
//! - Append page versions to an append-only log
//! - Look up the newest live version at or below a requested version
//! - Tombstone versions without rewriting their bytes
//! - Rebuild the in-memory index from disk on open
//!
//! ## File Format
//! ```text
//! pages.log                               pages.idx
//! ┌──────────────────────────────────┐    ┌──────────────────────────────┐
//! │ Page(8) Ver(8) CRC(4) Data(page) │◄───│ Page(8) Ver(8) Off(8) Tomb(1)│
//! ├──────────────────────────────────┤    ├──────────────────────────────┤
//! │ Page(8) Ver(8) CRC(4) Data(page) │◄───│ Page(8) Ver(8) Off(8) Tomb(1)│
//! └──────────────────────────────────┘    │ ... tombstones appended too  │
//!                                         └──────────────────────────────┘
//! ```

mod entry;
mod index;
mod log;
mod manager;

pub use entry::{PageLogIndexEntry, INDEX_ENTRY_SIZE};
pub use index::PageLogIndex;
pub use log::{PageLog, RecoveryResult, RECORD_HEADER_SIZE};
pub use manager::PageLogManager;
