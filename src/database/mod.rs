//! Database Module
//!
//! Splits a logical database file into fixed-capacity range files on the
//! tiered file system.
//!
//! ## Responsibilities
//! - Translate byte offsets to (range, slot) positions
//! - Create ranges lazily; delete them when truncated away
//! - Keep the authoritative page count in a metadata side file
//! - Expose a pre-write hook for capturing page versions
//!
//! ## Layout
//! ```text
//! databases/{database}/{branch}/
//!   ├── metadata               (bincode DatabaseMetadata)
//!   └── ranges/
//!         ├── 0000000000       (pages 1 .. max_pages-1)
//!         ├── 0000000001       (pages max_pages .. 2*max_pages-1)
//!         └── ...
//! ```

mod file_system;
mod metadata;
mod range;

pub use file_system::{DurableDatabaseFs, WriteHook};
pub use metadata::DatabaseMetadata;
pub use range::DataRange;
