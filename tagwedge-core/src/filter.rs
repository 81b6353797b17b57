//! Duplicate tag filter
//!
//! Fixed table of recently seen EPCs. A tag is emitted the first time it is
//! seen and again only once the debounce window has passed since its last
//! emission. Slots are reused in insertion order when the table is full,
//! whatever the recency of the evicted entry.

use heapless::Vec;
use tagwedge_protocol::tag::MAX_EPC_LEN;

use crate::config::DEFAULT_DEBOUNCE_MS;

/// Number of EPCs tracked at once
pub const FILTER_SLOTS: usize = 32;

/// One tracked EPC
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterEntry {
    pub epc: Vec<u8, MAX_EPC_LEN>,
    pub last_sent_at: u64,
    pub last_seen_at: u64,
    pub rssi_min: u8,
    pub rssi_max: u8,
    pub read_count: u32,
}

/// Totals over the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterSummary {
    /// EPCs still held in the table
    pub unique_tags: usize,
    /// Reads of those EPCs, suppressed ones included
    pub total_reads: u32,
}

/// Debounce cache keyed by EPC
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    slots: Vec<FilterEntry, FILTER_SLOTS>,
    next: usize,
    debounce_ms: u64,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl DuplicateFilter {
    pub const fn new(debounce_ms: u32) -> Self {
        Self {
            slots: Vec::new(),
            next: 0,
            debounce_ms: debounce_ms as u64,
        }
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn set_debounce_ms(&mut self, debounce_ms: u32) {
        self.debounce_ms = debounce_ms as u64;
    }

    pub fn set_debounce_seconds(&mut self, seconds: u32) {
        self.debounce_ms = seconds as u64 * 1000;
    }

    /// Record a read of `epc` and decide whether to emit it
    ///
    /// Read count and RSSI range are updated even when the read is
    /// suppressed.
    pub fn check(&mut self, epc: &[u8], rssi: u8, now_ms: u64) -> bool {
        let epc = &epc[..epc.len().min(MAX_EPC_LEN)];

        if let Some(entry) = self.slots.iter_mut().find(|e| e.epc.as_slice() == epc) {
            entry.rssi_min = entry.rssi_min.min(rssi);
            entry.rssi_max = entry.rssi_max.max(rssi);
            entry.last_seen_at = now_ms;
            entry.read_count = entry.read_count.saturating_add(1);

            if now_ms.saturating_sub(entry.last_sent_at) < self.debounce_ms {
                return false;
            }
            entry.last_sent_at = now_ms;
            return true;
        }

        let mut stored = Vec::new();
        // Length clamped above
        let _ = stored.extend_from_slice(epc);
        let entry = FilterEntry {
            epc: stored,
            last_sent_at: now_ms,
            last_seen_at: now_ms,
            rssi_min: rssi,
            rssi_max: rssi,
            read_count: 1,
        };

        if self.slots.is_full() {
            self.slots[self.next] = entry;
        } else {
            // Not full, cannot fail
            let _ = self.slots.push(entry);
        }
        self.next = (self.next + 1) % FILTER_SLOTS;
        true
    }

    /// Forget every tracked EPC
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Tracked entries, in slot order
    pub fn entries(&self) -> impl Iterator<Item = &FilterEntry> {
        self.slots.iter()
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            unique_tags: self.slots.len(),
            total_reads: self
                .slots
                .iter()
                .fold(0u32, |acc, e| acc.saturating_add(e.read_count)),
        }
    }
}
