//! End-to-end scenarios against the assembled `HighLevelCache`, covering the
//! properties that only show up once the builder, loaders, TTL/stale
//! handling, and background threads are wired together (unit tests closer
//! to each piece live alongside that piece's source file).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use stratum_cache::{Algorithm, CacheBuilder, Clock};

#[test]
fn stale_while_revalidate_serves_the_old_value_and_refreshes_in_background() {
    let (clock, handle) = Clock::offset();
    let reload_count = Arc::new(AtomicUsize::new(0));
    let reload_count2 = reload_count.clone();

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8)
        .ttl(Duration::from_nanos(100))
        .stale(Duration::from_nanos(100), None)
        .clock(clock)
        .loaders(vec![Box::new(move |keys: &[u32]| {
            reload_count2.fetch_add(1, Ordering::SeqCst);
            let mut found = HashMap::new();

            for key in keys {
                found.insert(*key, *key * 100);
            }

            Ok::<_, String>(found)
        })])
        .build()
        .unwrap();

    cache.set(1, 1).unwrap();
    assert_eq!(cache.get(&1).unwrap(), Some(1));

    // Past the TTL but within the stale window: still served, and a
    // background revalidation is kicked off.
    handle.advance_ns(150);
    assert_eq!(cache.get(&1).unwrap(), Some(1));

    let mut refreshed = None;

    for _ in 0..200 {
        std::thread::sleep(Duration::from_millis(5));

        if let Some(value) = cache.peek(&1) {
            if value == 100 {
                refreshed = Some(value);
                break;
            }
        }
    }

    assert_eq!(refreshed, Some(100), "background revalidation never refreshed the stale entry");
}

#[test]
fn past_the_stale_window_the_entry_is_gone() {
    let (clock, handle) = Clock::offset();

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8).ttl(Duration::from_nanos(100)).stale(Duration::from_nanos(50), None).clock(clock).build().unwrap();

    cache.set(1, 1).unwrap();
    handle.advance_ns(1_000);

    assert_eq!(cache.peek(&1), None);
}

#[test]
fn missing_dedicated_cache_remembers_a_negative_lookup_without_reloading() {
    let load_count = Arc::new(AtomicUsize::new(0));
    let load_count2 = load_count.clone();

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8)
        .missing_dedicated(Algorithm::Lru, 8)
        .loaders(vec![Box::new(move |_keys: &[u32]| {
            load_count2.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(HashMap::new())
        })])
        .build()
        .unwrap();

    assert_eq!(cache.get(&42).unwrap(), None);
    assert!(cache.has(&42));
    assert_eq!(cache.get(&42).unwrap(), None);

    // The negative entry satisfied the second lookup without reloading.
    assert_eq!(load_count.load(Ordering::SeqCst), 1);

    let (main_capacity, missing_capacity) = cache.capacity();
    assert_eq!(main_capacity, 8);
    assert_eq!(missing_capacity, 8);
}

#[test]
fn missing_disabled_by_default_never_remembers_an_absent_key() {
    let load_count = Arc::new(AtomicUsize::new(0));
    let load_count2 = load_count.clone();

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8)
        .loaders(vec![Box::new(move |_keys: &[u32]| {
            load_count2.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(HashMap::new())
        })])
        .build()
        .unwrap();

    assert_eq!(cache.get(&1).unwrap(), None);
    assert_eq!(cache.get(&1).unwrap(), None);
    assert!(!cache.has(&1));

    assert_eq!(load_count.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_gets_for_the_same_missing_key_share_one_load() {
    const THREADS: usize = 32;

    let load_count = Arc::new(AtomicUsize::new(0));
    let load_count2 = load_count.clone();
    let barrier = Arc::new(Barrier::new(THREADS));

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8)
        .loaders(vec![Box::new(move |keys: &[u32]| {
            load_count2.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));

            let mut found = HashMap::new();
            for key in keys {
                found.insert(*key, 7);
            }

            Ok::<_, String>(found)
        })])
        .build()
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();

            std::thread::spawn(move || {
                barrier.wait();
                cache.get(&1).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.iter().all(|r| *r == Some(7)));
    assert_eq!(load_count.load(Ordering::SeqCst), 1);
}

#[test]
fn janitor_reclaims_expired_entries_in_the_background() {
    let evicted = Arc::new(AtomicUsize::new(0));
    let evicted2 = evicted.clone();

    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 8)
        .ttl(Duration::from_millis(10))
        .eviction_callback(move |_k, _v, _reason| {
            evicted2.fetch_add(1, Ordering::SeqCst);
        })
        .janitor()
        .build()
        .unwrap();

    cache.set(1, 1).unwrap();
    assert_eq!(cache.peek(&1), Some(1));

    let mut swept = false;

    for _ in 0..100 {
        std::thread::sleep(Duration::from_millis(10));

        if evicted.load(Ordering::SeqCst) > 0 {
            swept = true;
            break;
        }
    }

    assert!(swept, "janitor never swept the expired entry");
    assert_eq!(cache.peek(&1), None);
}

#[test]
fn sharded_high_level_cache_distributes_and_round_trips_keys() {
    let cache: stratum_cache::HighLevelCache<u32, u32, String> = CacheBuilder::new(Algorithm::Lru, 4).sharding(4, Arc::new(|k: &u32| *k as u64)).build().unwrap();

    for key in 0..32 {
        cache.set(key, key * 2).unwrap();
    }

    for key in 0..32 {
        assert_eq!(cache.get(&key).unwrap(), Some(key * 2));
    }
}
