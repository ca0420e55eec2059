use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

use super::types::{ActorId, NegotiationChanceRecord};
use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
    pub len: usize,
}

struct CacheEntry {
    record: NegotiationChanceRecord,
    stored_at: Instant,
}

struct Inner {
    entries: LruCache<ActorId, CacheEntry>,
    stats: CacheStats,
}

impl Inner {
    fn store(&mut self, actor: ActorId, record: NegotiationChanceRecord, now: Instant) {
        let displaced = self.entries.push(
            actor,
            CacheEntry {
                record,
                stored_at: now,
            },
        );
        // push hands back either the replaced value for this key or an evicted LRU entry
        if let Some((key, _)) = displaced {
            if key != actor {
                self.stats.evicted += 1;
                debug!("Evicted cached chance for actor {}", key);
            }
        }
        self.stats.len = self.entries.len();
    }
}

/// Actor -> most recent negotiation chance.
///
/// At most one record per actor; an upsert replaces every field of the previous
/// one. Entries leave by capacity (least recently used) or by TTL on lookup.
/// Callers must treat a miss as "recompute from the event", never as an error.
pub struct CorrelationCache {
    inner: Mutex<Inner>,
    ttl: Option<Duration>,
}

impl CorrelationCache {
    pub fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity, config.ttl())
    }

    pub fn upsert(&self, actor: ActorId, record: NegotiationChanceRecord) {
        self.upsert_at(actor, record, Instant::now());
    }

    pub fn upsert_at(&self, actor: ActorId, record: NegotiationChanceRecord, now: Instant) {
        self.inner.lock().store(actor, record, now);
    }

    /// Write-back after a recompute that ran without the lock. Stores `record`
    /// unless another record for `actor` was stored at or after `since`, so a
    /// fresher upsert from another call path wins. Returns whether it stored.
    pub fn upsert_unless_newer(
        &self,
        actor: ActorId,
        record: NegotiationChanceRecord,
        since: Instant,
    ) -> bool {
        self.upsert_unless_newer_at(actor, record, since, Instant::now())
    }

    pub fn upsert_unless_newer_at(
        &self,
        actor: ActorId,
        record: NegotiationChanceRecord,
        since: Instant,
        now: Instant,
    ) -> bool {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.peek(&actor) {
            if entry.stored_at >= since {
                debug!("Kept newer cached chance for actor {}", actor);
                return false;
            }
        }
        inner.store(actor, record, now);
        true
    }

    pub fn lookup(&self, actor: ActorId) -> Option<NegotiationChanceRecord> {
        self.lookup_at(actor, Instant::now())
    }

    pub fn lookup_at(&self, actor: ActorId, now: Instant) -> Option<NegotiationChanceRecord> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let ttl = self.ttl;
        let expired = inner.entries.get(&actor).map(|entry| {
            ttl.is_some_and(|ttl| now.saturating_duration_since(entry.stored_at) > ttl)
        });

        let Some(expired) = expired else {
            inner.stats.misses += 1;
            return None;
        };

        if expired {
            inner.entries.pop(&actor);
            inner.stats.expired += 1;
            inner.stats.misses += 1;
            inner.stats.len = inner.entries.len();
            return None;
        }

        inner.stats.hits += 1;
        inner.entries.peek(&actor).map(|entry| entry.record.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            len: inner.entries.len(),
            ..inner.stats
        }
    }
}
