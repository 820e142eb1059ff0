//! Cache usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a live entry.
    pub hits: u64,
    /// Lookups that led a fetch.
    pub misses: u64,
    /// Lookups that waited on another caller's in-flight fetch.
    pub joined: u64,
    /// Entries dropped because they outlived their TTL.
    pub expirations: u64,
    /// Entries dropped to respect the capacity bound.
    pub evictions: u64,
    /// Entries currently stored, including in-flight slots.
    pub entry_count: u64,
}

impl CacheStats {
    /// Fraction of lookups that avoided a downstream call (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joined) as f64 / total as f64
        }
    }
}

impl std::iter::Sum for CacheStats {
    fn sum<I: Iterator<Item = CacheStats>>(iter: I) -> Self {
        iter.fold(CacheStats::default(), |acc, s| CacheStats {
            hits: acc.hits + s.hits,
            misses: acc.misses + s.misses,
            joined: acc.joined + s.joined,
            expirations: acc.expirations + s.expirations,
            evictions: acc.evictions + s.evictions,
            entry_count: acc.entry_count + s.entry_count,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub joined: AtomicU64,
    pub expirations: AtomicU64,
    pub evictions: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}
