//! Router statistics

use portable_atomic::{AtomicU32, Ordering};

use crate::link::LinkShared;

/// Snapshot of the router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouterStats {
    pub bytes_received: u32,
    pub bytes_sent: u32,
    /// Receive calls that found the inbound ring full
    pub overruns: u32,
    pub frames_received: u32,
    pub crc_errors: u32,
    /// Rejected length bytes, overflows and stale partial frames
    pub frame_errors: u32,
    pub parse_errors: u32,
    pub tags_decoded: u32,
    pub tags_emitted: u32,
    pub tags_suppressed: u32,
    pub sink_errors: u32,
    /// Outbound bytes dropped because the ring was full
    pub tx_dropped: u32,
    pub rounds_started: u32,
    pub round_timeouts: u32,
}

impl RouterStats {
    /// Frames or bytes thrown away for any reason
    pub fn receive_errors(&self) -> u32 {
        self.crc_errors
            .saturating_add(self.frame_errors)
            .saturating_add(self.parse_errors)
    }
}

/// Live counters, updated from `&self`
#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub frames_received: AtomicU32,
    pub crc_errors: AtomicU32,
    pub frame_errors: AtomicU32,
    pub parse_errors: AtomicU32,
    pub tags_decoded: AtomicU32,
    pub tags_emitted: AtomicU32,
    pub tags_suppressed: AtomicU32,
    pub sink_errors: AtomicU32,
    pub tx_dropped: AtomicU32,
    pub rounds_started: AtomicU32,
    pub round_timeouts: AtomicU32,
}

pub(crate) fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn add(counter: &AtomicU32, n: u32) {
    if n != 0 {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

impl Stats {
    pub fn frames(&self) -> u32 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, link: &LinkShared) -> RouterStats {
        let get = |c: &AtomicU32| c.load(Ordering::Relaxed);
        RouterStats {
            bytes_received: link.rx_bytes(),
            bytes_sent: link.tx_bytes(),
            overruns: link.overruns(),
            frames_received: get(&self.frames_received),
            crc_errors: get(&self.crc_errors),
            frame_errors: get(&self.frame_errors),
            parse_errors: get(&self.parse_errors),
            tags_decoded: get(&self.tags_decoded),
            tags_emitted: get(&self.tags_emitted),
            tags_suppressed: get(&self.tags_suppressed),
            sink_errors: get(&self.sink_errors),
            tx_dropped: get(&self.tx_dropped),
            rounds_started: get(&self.rounds_started),
            round_timeouts: get(&self.round_timeouts),
        }
    }

    pub fn reset(&self, link: &LinkShared) {
        for counter in [
            &self.frames_received,
            &self.crc_errors,
            &self.frame_errors,
            &self.parse_errors,
            &self.tags_decoded,
            &self.tags_emitted,
            &self.tags_suppressed,
            &self.sink_errors,
            &self.tx_dropped,
            &self.rounds_started,
            &self.round_timeouts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        link.reset_counters();
    }
}
