use serde::Serialize;

/// Cumulative kernel IO counters for one mounted device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoStat {
    pub device:      String,
    pub read_count:  u64,
    pub write_count: u64,
    pub read_bytes:  u64,
    pub write_bytes: u64,
    /// Milliseconds spent reading.
    pub read_time:   u64,
    /// Milliseconds spent writing.
    pub write_time:  u64,
}
