use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use trade_telemetry::config::CacheConfig;
use trade_telemetry::correlation::{ActorId, CorrelationCache, NegotiationChanceRecord, OfferedItem};

fn record(label: &str, price: f32, chance: f32) -> NegotiationChanceRecord {
    NegotiationChanceRecord::new(label, vec![OfferedItem::new("ogkush", 1)], price, chance)
}

fn cache(capacity: usize, ttl: Option<Duration>) -> CorrelationCache {
    CorrelationCache::new(NonZeroUsize::new(capacity).unwrap(), ttl)
}

#[test]
fn test_last_write_wins() {
    let cache = cache(8, None);

    cache.upsert(ActorId(1), record("Kyle", 50.0, 0.4));
    cache.upsert(ActorId(1), record("Kyle", 70.0, 0.2));

    let cached = cache.lookup(ActorId(1)).unwrap();
    assert_eq!(cached.chance, 0.2);
    assert_eq!(cached.asking_price, 70.0);
    assert_eq!(cache.len(), 1, "One record per actor");
}

#[test]
fn test_write_back_yields_to_newer_record() {
    let cache = cache(8, None);
    let t0 = Instant::now();

    // 1. Absent: stored
    assert!(cache.upsert_unless_newer_at(ActorId(1), record("Kyle", 50.0, 0.4), t0, t0));

    // 2. Another path stores after the recompute started: kept
    let started = t0 + Duration::from_secs(1);
    cache.upsert_at(ActorId(1), record("Kyle", 60.0, 0.9), t0 + Duration::from_secs(2));
    assert!(!cache.upsert_unless_newer_at(
        ActorId(1),
        record("Kyle", 50.0, 0.1),
        started,
        t0 + Duration::from_secs(3),
    ));
    assert_eq!(cache.lookup(ActorId(1)).unwrap().chance, 0.9);

    // 3. Record older than the recompute: replaced
    let started = t0 + Duration::from_secs(4);
    assert!(cache.upsert_unless_newer_at(
        ActorId(1),
        record("Kyle", 55.0, 0.3),
        started,
        t0 + Duration::from_secs(5),
    ));
    assert_eq!(cache.lookup(ActorId(1)).unwrap().chance, 0.3);
}

#[test]
fn test_miss_is_none() {
    let cache = cache(8, None);
    assert!(cache.lookup(ActorId(42)).is_none());

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
}

#[test]
fn test_chance_is_clamped() {
    assert_eq!(record("a", 1.0, 1.7).chance, 1.0);
    assert_eq!(record("a", 1.0, -0.3).chance, 0.0);
}

#[test]
fn test_expired_entry_is_removed() {
    let cache = cache(8, Some(Duration::from_secs(60)));
    let t0 = Instant::now();

    cache.upsert_at(ActorId(1), record("Kyle", 50.0, 0.4), t0);
    assert!(cache.lookup_at(ActorId(1), t0 + Duration::from_secs(30)).is_some());
    assert!(cache.lookup_at(ActorId(1), t0 + Duration::from_secs(61)).is_none());

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.len, 0);
}

#[test]
fn test_least_recently_used_is_evicted() {
    let cache = cache(2, None);

    cache.upsert(ActorId(1), record("a", 1.0, 0.1));
    cache.upsert(ActorId(2), record("b", 1.0, 0.2));
    // touch 1 so 2 becomes the eviction candidate
    assert!(cache.lookup(ActorId(1)).is_some());
    cache.upsert(ActorId(3), record("c", 1.0, 0.3));

    assert!(cache.lookup(ActorId(2)).is_none());
    assert!(cache.lookup(ActorId(1)).is_some());
    assert!(cache.lookup(ActorId(3)).is_some());
    assert_eq!(cache.stats().evicted, 1);
}

#[test]
fn test_replacing_is_not_an_eviction() {
    let cache = cache(1, None);
    cache.upsert(ActorId(1), record("a", 1.0, 0.1));
    cache.upsert(ActorId(1), record("a", 2.0, 0.2));
    assert_eq!(cache.stats().evicted, 0);
}

#[test]
fn test_from_config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.capacity, 512);
    assert_eq!(config.ttl(), Some(Duration::from_secs(900)));

    let no_expiry = CacheConfig {
        ttl_secs: 0,
        ..config
    };
    assert_eq!(no_expiry.ttl(), None);
    assert!(CorrelationCache::from_config(&no_expiry).is_empty());
}

#[test]
fn test_concurrent_upserts_keep_one_record_per_actor() {
    let cache = Arc::new(cache(64, None));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let actor = ActorId(i % 10);
                    cache.upsert(actor, record("x", worker as f32, 0.5));
                    let _ = cache.lookup(actor);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 10);
}
