//! PULSE Cache - short-lived, identity-scoped response cache
//!
//! Sits in front of every downstream read. Entries are keyed by resource and
//! requester identity, expire after a short TTL, and concurrent misses for
//! the same key collapse into a single downstream fetch.

pub mod key;
pub mod read_through;
pub mod stats;

pub use key::CacheKey;
pub use read_through::{CacheConfig, Lookup, ResponseCache};
pub use stats::CacheStats;
