//! Integration tests for the reverse DNS cache.
//!
//! These tests inject a counting lookup and a manual clock to verify cache
//! hits, fallbacks and expiry without touching the network.

use druid_exporter::resolver::{AddressResolver, Clock, ReverseLookup};
use druid_exporter::model::pod_name;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_secs(300);

/// Lookup answering from a fixed table and counting every call.
struct FakeLookup {
    names: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl FakeLookup {
    fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            names: entries
                .iter()
                .map(|(ip, name)| (ip.to_string(), vec![name.to_string()]))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReverseLookup for FakeLookup {
    fn lookup_addr(&self, address: &str) -> io::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names
            .get(address)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no PTR record"))
    }
}

/// Clock that only moves when told to.
struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
        })
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

fn resolver(lookup: &Arc<FakeLookup>, clock: &Arc<ManualClock>) -> AddressResolver {
    AddressResolver::with_parts(TTL, lookup.clone(), clock.clone())
}

#[test]
fn test_resolved_name_is_shortened_and_cached() {
    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7.cluster.internal.")]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    assert_eq!(resolver.resolve("10.0.0.7"), "worker-7");
    assert_eq!(lookup.calls(), 1);

    // Second call within the TTL is served from the cache
    clock.advance(Duration::from_secs(60));
    assert_eq!(resolver.resolve("10.0.0.7"), "worker-7");
    assert_eq!(lookup.calls(), 1);
}

#[test]
fn test_unresolvable_address_falls_back_and_is_cached() {
    let lookup = FakeLookup::new(&[]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    assert_eq!(resolver.resolve("10.1.2.3"), "10.1.2.3");
    assert_eq!(resolver.resolve("10.1.2.3"), "10.1.2.3");
    assert_eq!(lookup.calls(), 1, "failed lookups must be cached too");
}

#[test]
fn test_expired_entry_triggers_new_lookup() {
    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7.cluster.internal")]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    resolver.resolve("10.0.0.7");
    clock.advance(TTL + Duration::from_secs(1));

    assert!(resolver.cached("10.0.0.7").is_none());
    assert_eq!(resolver.resolve("10.0.0.7"), "worker-7");
    assert_eq!(lookup.calls(), 2);
}

#[test]
fn test_cached_never_performs_lookup() {
    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7")]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    assert_eq!(resolver.cached("10.0.0.7"), None);
    assert_eq!(lookup.calls(), 0);
}

#[test]
fn test_purge_expired_keeps_fresh_entries() {
    let lookup = FakeLookup::new(&[]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    resolver.resolve("10.0.0.1");
    clock.advance(Duration::from_secs(200));
    resolver.resolve("10.0.0.2");
    clock.advance(Duration::from_secs(200));

    // 10.0.0.1 is 400s old, 10.0.0.2 only 200s
    assert_eq!(resolver.len(), 2);
    assert_eq!(resolver.purge_expired(), 1);
    assert_eq!(resolver.len(), 1);
    assert_eq!(resolver.cached("10.0.0.2").as_deref(), Some("10.0.0.2"));
}

#[test]
fn test_concurrent_resolves_share_cache() {
    let lookup = FakeLookup::new(&[("10.0.0.9", "worker-9.example")]);
    let clock = ManualClock::new();
    let resolver = Arc::new(resolver(&lookup, &clock));
    resolver.resolve("10.0.0.9");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.resolve("10.0.0.9"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "worker-9");
    }
    assert_eq!(lookup.calls(), 1);
}

#[test]
fn test_pod_name_of_unresolved_ip_is_first_octet() {
    let lookup = FakeLookup::new(&[]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);

    let resolved = resolver.resolve("10.0.0.5");
    assert_eq!(pod_name(&resolved), "10");
}

#[test]
fn test_pod_name_of_resolved_hostname_is_leading_label() {
    assert_eq!(pod_name("worker-7.cluster.internal"), "worker-7");

    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7.cluster.internal")]);
    let clock = ManualClock::new();
    let resolver = resolver(&lookup, &clock);
    let resolved = resolver.resolve("10.0.0.7");
    assert_eq!(pod_name(&resolved), "worker-7");
}

#[test]
fn test_claim_is_exclusive_until_released() {
    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7.cluster.internal")]);
    let clock = ManualClock::new();
    let resolver = Arc::new(resolver(&lookup, &clock));

    let first = resolver.claim("10.0.0.7").expect("first claim");
    assert!(resolver.claim("10.0.0.7").is_none());
    assert!(resolver.claim("10.0.0.8").is_some());
    assert_eq!(resolver.in_flight(), 1);

    assert_eq!(first.address(), "10.0.0.7");
    assert_eq!(first.resolve(), "worker-7");
    assert_eq!(resolver.in_flight(), 0);
    assert!(resolver.claim("10.0.0.7").is_some());
    assert_eq!(lookup.calls(), 1);
}

#[test]
fn test_ttl_beyond_instant_range_saturates() {
    let lookup = FakeLookup::new(&[("10.0.0.7", "worker-7")]);
    let clock = ManualClock::new();
    let resolver =
        AddressResolver::with_parts(Duration::from_secs(u64::MAX), lookup.clone(), clock.clone());

    assert_eq!(resolver.resolve("10.0.0.7"), "worker-7");
    clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
    assert_eq!(resolver.resolve("10.0.0.7"), "worker-7");
    assert_eq!(resolver.purge_expired(), 0);
    assert_eq!(lookup.calls(), 1);
}
