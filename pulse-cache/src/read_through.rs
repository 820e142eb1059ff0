//! Read-through response cache with single-flight collapsing.
//!
//! [`ResponseCache::get_or_fetch`] serves a live entry when one exists and
//! otherwise runs the supplied fetch. Concurrent lookups of the same key share
//! one fetch: the first caller leads, later callers wait on its result.
//! Only successful results are stored; failures reach every waiter of that
//! flight but the next lookup fetches again.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pulse_core::{ConfigError, DownstreamResult};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::key::CacheKey;
use crate::stats::{CacheStats, StatsCounters};

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a successful result stays servable.
    pub ttl: Duration,
    /// Upper bound on stored entries; `0` means unbounded.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the max entries; `0` disables the bound.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl".to_string(),
                value: "0".to_string(),
                reason: "TTL must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// How a lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A live entry was returned.
    Hit,
    /// This caller ran the fetch.
    Miss,
    /// This caller waited on another caller's fetch.
    Joined,
}

impl Lookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookup::Hit => "hit",
            Lookup::Miss => "miss",
            Lookup::Joined => "joined",
        }
    }
}

// ============================================================================
// SLOTS
// ============================================================================

type Published<V> = Option<DownstreamResult<V>>;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    last_access: Instant,
}

enum Slot<V> {
    Ready(CacheEntry<V>),
    InFlight {
        id: u64,
        rx: watch::Receiver<Published<V>>,
    },
}

enum Claim<V> {
    Hit(V),
    Follow(watch::Receiver<Published<V>>),
    Lead {
        id: u64,
        tx: watch::Sender<Published<V>>,
    },
}

/// Clears the leader's in-flight slot if its fetch is dropped before
/// publishing, so waiters can claim the key again.
struct FlightGuard<'a, V> {
    entries: &'a DashMap<CacheKey, Slot<V>>,
    key: &'a CacheKey,
    id: u64,
    armed: bool,
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            let id = self.id;
            self.entries
                .remove_if(self.key, |_, slot| is_flight(slot, id));
        }
    }
}

fn is_flight<V>(slot: &Slot<V>, flight: u64) -> bool {
    matches!(slot, Slot::InFlight { id, .. } if *id == flight)
}

// ============================================================================
// CACHE
// ============================================================================

/// Short-TTL in-memory cache keyed by resource and identity.
///
/// Safe to share across every in-flight request; the entry map is the only
/// mutable shared state.
pub struct ResponseCache<V> {
    entries: DashMap<CacheKey, Slot<V>>,
    config: CacheConfig,
    stats: StatsCounters,
    next_flight: AtomicU64,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: StatsCounters::default(),
            next_flight: AtomicU64::new(1),
        }
    }

    /// Create a new cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the live entry for `key`, or run `fetch` exactly once across
    /// all concurrent callers of the same key.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> DownstreamResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DownstreamResult<V>>,
    {
        self.get_or_fetch_with_outcome(key, fetch).await.0
    }

    /// Like [`ResponseCache::get_or_fetch`], also reporting how the lookup
    /// was served.
    pub async fn get_or_fetch_with_outcome<F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
    ) -> (DownstreamResult<V>, Lookup)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DownstreamResult<V>>,
    {
        let (id, tx) = loop {
            match self.claim(key) {
                Claim::Hit(value) => {
                    tracing::trace!(key = %key, "cache hit");
                    return (DownstreamResult::Success(value), Lookup::Hit);
                }
                Claim::Lead { id, tx } => break (id, tx),
                Claim::Follow(mut rx) => {
                    let published = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|published| (*published).clone());
                    if let Some(result) = published {
                        StatsCounters::bump(&self.stats.joined);
                        return (result, Lookup::Joined);
                    }
                    tracing::debug!(key = %key, "in-flight fetch abandoned, claiming again");
                }
            }
        };

        let mut guard = FlightGuard {
            entries: &self.entries,
            key,
            id,
            armed: true,
        };
        let result = fetch().await;
        guard.armed = false;

        match &result {
            DownstreamResult::Success(value) => self.complete(key, id, value.clone()),
            _ => {
                self.entries.remove_if(key, |_, slot| is_flight(slot, id));
            }
        }
        tx.send_replace(Some(result.clone()));
        (result, Lookup::Miss)
    }

    /// The live value for `key`, without fetching.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key).as_deref() {
            Some(Slot::Ready(entry)) if entry.expires_at > now => Some(entry.value.clone()),
            _ => None,
        }
    }

    /// Drop the entry for `key`. A fetch in flight for it still completes
    /// for its waiters but is not stored.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry belonging to `identity`, returning how many stored
    /// values were removed. In-flight fetches are dropped too but not counted.
    pub fn invalidate_identity(&self, identity: &str) -> u64 {
        let mut removed = 0;
        self.entries.retain(|key, slot| {
            if !key.is_owned_by(identity) {
                return true;
            }
            if matches!(slot, Slot::Ready(_)) {
                removed += 1;
            }
            false
        });
        removed
    }

    /// Drop expired entries eagerly. Lookups already expire lazily.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| match slot {
            Slot::Ready(entry) => entry.expires_at > now,
            Slot::InFlight { .. } => true,
        });
        let purged = before.saturating_sub(self.entries.len()) as u64;
        self.stats.expirations.fetch_add(purged, Ordering::Relaxed);
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    fn claim(&self, key: &CacheKey) -> Claim<V> {
        let now = Instant::now();
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let live = match occupied.get() {
                    Slot::Ready(entry) => entry.expires_at > now,
                    Slot::InFlight { rx, .. } => return Claim::Follow(rx.clone()),
                };
                if live {
                    if let Slot::Ready(entry) = occupied.get_mut() {
                        entry.last_access = now;
                        StatsCounters::bump(&self.stats.hits);
                        return Claim::Hit(entry.value.clone());
                    }
                }
                StatsCounters::bump(&self.stats.expirations);
                StatsCounters::bump(&self.stats.misses);
                let (id, tx, rx) = self.new_flight();
                occupied.insert(Slot::InFlight { id, rx });
                Claim::Lead { id, tx }
            }
            Entry::Vacant(vacant) => {
                StatsCounters::bump(&self.stats.misses);
                let (id, tx, rx) = self.new_flight();
                vacant.insert(Slot::InFlight { id, rx });
                Claim::Lead { id, tx }
            }
        }
    }

    fn new_flight(&self) -> (u64, watch::Sender<Published<V>>, watch::Receiver<Published<V>>) {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        (id, tx, rx)
    }

    /// Store a successful result, unless the flight was busted meanwhile.
    fn complete(&self, key: &CacheKey, id: u64, value: V) {
        let now = Instant::now();
        let stored = match self.entries.get_mut(key) {
            Some(mut slot) => {
                let ours = is_flight(&*slot, id);
                if ours {
                    *slot = Slot::Ready(CacheEntry {
                        value,
                        expires_at: now + self.config.ttl,
                        last_access: now,
                    });
                }
                ours
            }
            None => false,
        };

        if stored {
            self.evict_over_capacity(key);
        } else {
            tracing::debug!(key = %key, "entry invalidated during fetch, result not cached");
        }
    }

    /// Evict least-recently-used ready entries until within capacity.
    fn evict_over_capacity(&self, keep: &CacheKey) {
        if self.config.max_entries == 0 {
            return;
        }
        while self.entries.len() > self.config.max_entries {
            let victim = self
                .entries
                .iter()
                .filter_map(|item| match item.value() {
                    Slot::Ready(entry) if item.key() != keep => {
                        Some((item.key().clone(), entry.last_access))
                    }
                    _ => None,
                })
                .min_by_key(|(_, last_access)| *last_access)
                .map(|(key, _)| key);

            match victim {
                Some(key) => {
                    if self.entries.remove(&key).is_some() {
                        StatsCounters::bump(&self.stats.evictions);
                    }
                }
                None => break,
            }
        }
    }
}
