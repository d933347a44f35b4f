//! Process-wide scan counters
//!
//! Probe cache hits and misses plus spawns of the external pack tool. Read back as a
//! snapshot for the end-of-scan debug line.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static PROBE_CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static PROBE_CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static TOOL_RUNS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub tool_invocations: u64,
}

impl CounterSnapshot {
    /// Share of lookups served from cache, 0.0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            lookups => self.cache_hits as f64 / lookups as f64,
        }
    }
}

pub fn record_cache_hit() {
    PROBE_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cache_miss() {
    PROBE_CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

/// One spawn of the external pack tool
pub fn record_tool_invocation() {
    TOOL_RUNS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> CounterSnapshot {
    CounterSnapshot {
        cache_hits: PROBE_CACHE_HITS.load(Ordering::Relaxed),
        cache_misses: PROBE_CACHE_MISSES.load(Ordering::Relaxed),
        tool_invocations: TOOL_RUNS.load(Ordering::Relaxed),
    }
}
