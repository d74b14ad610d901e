//! In-memory page log index
//!
//! Maps each page to its entries in append (= ascending version) order.
//! Always rebuilt by replaying the on-disk index at open.

use std::collections::BTreeMap;

use super::PageLogIndexEntry;

/// PageNumber → ordered list of entries
#[derive(Debug, Default)]
pub struct PageLogIndex {
    pages: BTreeMap<u64, Vec<PageLogIndexEntry>>,
    entry_count: usize,
}

impl PageLogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; callers guarantee the version is newer than any existing one
    pub fn insert(&mut self, entry: PageLogIndexEntry) {
        self.pages.entry(entry.page_number).or_default().push(entry);
        self.entry_count += 1;
    }

    /// Mark (page, version) as tombstoned. Returns false if no live entry matched.
    pub fn tombstone(&mut self, page_number: u64, version: u64) -> bool {
        let Some(entries) = self.pages.get_mut(&page_number) else {
            return false;
        };
        match entries.binary_search_by_key(&version, |e| e.version) {
            Ok(pos) if !entries[pos].tombstoned => {
                entries[pos].tombstoned = true;
                true
            }
            _ => false,
        }
    }

    /// Newest live entry with `version <= requested`, or the newest live entry when `requested == 0`
    pub fn find(&self, page_number: u64, requested: u64) -> Option<&PageLogIndexEntry> {
        let entries = self.pages.get(&page_number)?;
        let end = if requested == 0 {
            entries.len()
        } else {
            entries.partition_point(|e| e.version <= requested)
        };
        entries[..end].iter().rev().find(|e| !e.tombstoned)
    }

    /// Oldest entry with `version > after`, tombstoned or not
    pub fn first_after(&self, page_number: u64, after: u64) -> Option<&PageLogIndexEntry> {
        let entries = self.pages.get(&page_number)?;
        entries.get(entries.partition_point(|e| e.version <= after))
    }

    /// Highest version ever appended for a page, tombstoned or not
    pub fn latest_version(&self, page_number: u64) -> Option<u64> {
        self.pages
            .get(&page_number)
            .and_then(|entries| entries.last())
            .map(|e| e.version)
    }

    /// Highest version appended for any page
    pub fn max_version(&self) -> u64 {
        self.pages
            .values()
            .filter_map(|entries| entries.last())
            .map(|e| e.version)
            .max()
            .unwrap_or(0)
    }

    /// Live versions of a page, ascending
    pub fn versions(&self, page_number: u64) -> Vec<u64> {
        self.pages
            .get(&page_number)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| !e.tombstoned)
                    .map(|e| e.version)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct pages with at least one entry
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of appended entries (tombstones do not add entries)
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.entry_count = 0;
    }
}
