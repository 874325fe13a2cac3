//! Bounded most-recent-first record of committed scans.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::result::CanonicalResult;
use crate::types::ScanResult;

/// Default number of entries kept per terminal session.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Abstraction over the wall clock so history timestamps are testable.
pub trait ClockSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock before 1970 is reported as 0 rather than failing the scan.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryEntry {
    pub result: CanonicalResult<ScanResult>,
    pub timestamp_ms: u64,
}

/// Fixed-capacity buffer, newest first. Entries are immutable once inserted;
/// pushing past capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct ScanHistory {
    entries: VecDeque<ScanHistoryEntry>,
    capacity: usize,
}

impl ScanHistory {
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ScanHistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ScanHistoryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&ScanHistoryEntry> {
        self.entries.front()
    }

    /// Owned copy for readers outside the owning session.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ScanHistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for ScanHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{EntityType, Location, ScannedCode};

    fn entry(n: u64) -> ScanHistoryEntry {
        ScanHistoryEntry {
            result: CanonicalResult::ok(ScanResult {
                code: ScannedCode {
                    raw: n.to_string(),
                    normalized: n.to_string(),
                    entity_type: EntityType::Box,
                },
                location: Location::BODEGA,
                data: json!(null),
            }),
            timestamp_ms: n,
        }
    }

    #[test]
    fn newest_first_and_bounded() {
        let mut history = ScanHistory::with_capacity(3);
        for n in 0..5 {
            history.push(entry(n));
        }
        assert_eq!(history.len(), 3);
        let stamps: Vec<u64> = history.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, vec![4, 3, 2]);
    }

    #[test]
    fn default_capacity_is_twenty() {
        let mut history = ScanHistory::default();
        for n in 0..50 {
            history.push(entry(n));
            assert!(history.len() <= DEFAULT_HISTORY_CAPACITY);
        }
        assert_eq!(history.latest().unwrap().timestamp_ms, 49);
        assert_eq!(history.snapshot().last().unwrap().timestamp_ms, 30);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(ScanHistory::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now_ms() > 0);
    }
}
