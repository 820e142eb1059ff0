//! Identity-scoped cache keys.
//!
//! A [`CacheKey`] cannot be built without naming the identity it belongs to,
//! so one requester's cached sections can never be served to another.

use pulse_core::ResourceKind;
use std::fmt;

/// Cache key made of the resource kind and the identity it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: KeyInner,
}

/// Private inner struct - prevents construction without an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    resource: ResourceKind,
    identity: String,
}

impl CacheKey {
    pub fn new(resource: ResourceKind, identity: impl Into<String>) -> Self {
        Self {
            inner: KeyInner {
                resource,
                identity: identity.into(),
            },
        }
    }

    pub fn resource(&self) -> ResourceKind {
        self.inner.resource
    }

    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// Whether this key belongs to `identity`.
    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.inner.identity == identity
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.resource, self.inner.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_differ_by_identity_and_resource() {
        let a = CacheKey::new(ResourceKind::Tasks, "u-1");
        let b = CacheKey::new(ResourceKind::Tasks, "u-2");
        let c = CacheKey::new(ResourceKind::Moods, "u-1");

        let set: HashSet<_> = [a.clone(), b, c, a.clone()].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(a.is_owned_by("u-1"));
        assert!(!a.is_owned_by("u-2"));
    }

    #[test]
    fn test_display() {
        let key = CacheKey::new(ResourceKind::JournalLinks, "abc");
        assert_eq!(key.to_string(), "journal_links:abc");
        assert_eq!(key.resource(), ResourceKind::JournalLinks);
        assert_eq!(key.identity(), "abc");
    }
}
