//! Reverse DNS resolution of worker addresses behind an expiring cache.
//!
//! Druid reports workers by IP address. For dashboards a short host name is
//! far more useful, but reverse DNS is slow and the answer for a given worker
//! rarely changes, so every answer (including "no name") is cached for a
//! fixed TTL and evicted lazily on the next access.
//!
//! The lookup function and the clock are injected through the [`ReverseLookup`]
//! and [`Clock`] traits so tests can count lookups and move time forward.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::ffi::CStr;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum host name length accepted by getnameinfo(3).
const MAX_HOST_LEN: usize = 1025;

/// Performs a reverse lookup of a single address.
pub trait ReverseLookup: Send + Sync {
    /// Returns every name registered for `address`, most preferred first.
    fn lookup_addr(&self, address: &str) -> io::Result<Vec<String>>;
}

/// Monotonic time source used for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// System resolver lookup using getnameinfo(3) with `NI_NAMEREQD`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

impl ReverseLookup for SystemLookup {
    fn lookup_addr(&self, address: &str) -> io::Result<Vec<String>> {
        let ip: IpAddr = address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let name = getnameinfo(SocketAddr::new(ip, 0))?;
        Ok(vec![name])
    }
}

fn getnameinfo(addr: SocketAddr) -> io::Result<String> {
    use std::mem;

    let mut host = [0 as libc::c_char; MAX_HOST_LEN];

    // SAFETY: the sockaddr structs are zero-initialised plain C structs filled
    // from the parsed address, and `host` outlives the call with its real length.
    let rc = unsafe {
        match addr {
            SocketAddr::V4(v4) => {
                let mut sin: libc::sockaddr_in = mem::zeroed();
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
                libc::getnameinfo(
                    &sin as *const libc::sockaddr_in as *const libc::sockaddr,
                    mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                    host.as_mut_ptr(),
                    host.len() as libc::socklen_t,
                    std::ptr::null_mut(),
                    0,
                    libc::NI_NAMEREQD,
                )
            }
            SocketAddr::V6(v6) => {
                let mut sin6: libc::sockaddr_in6 = mem::zeroed();
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_addr.s6_addr = v6.ip().octets();
                libc::getnameinfo(
                    &sin6 as *const libc::sockaddr_in6 as *const libc::sockaddr,
                    mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                    host.as_mut_ptr(),
                    host.len() as libc::socklen_t,
                    std::ptr::null_mut(),
                    0,
                    libc::NI_NAMEREQD,
                )
            }
        }
    };

    if rc != 0 {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("getnameinfo failed for {} (code {})", addr.ip(), rc),
        ));
    }

    // SAFETY: getnameinfo NUL-terminates `host` on success.
    let name = unsafe { CStr::from_ptr(host.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    /// `None` when the TTL reaches past the range of `Instant`.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Caching reverse resolver shared by all scrapes.
pub struct AddressResolver {
    lookup: Arc<dyn ReverseLookup>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashSet<String>>,
}

impl AddressResolver {
    /// Resolver backed by the system resolver and wall clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_parts(ttl, Arc::new(SystemLookup), Arc::new(SystemClock))
    }

    pub fn with_parts(ttl: Duration, lookup: Arc<dyn ReverseLookup>, clock: Arc<dyn Clock>) -> Self {
        Self {
            lookup,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached name for `address` if present and unexpired.
    ///
    /// Never performs I/O.
    pub fn cached(&self, address: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(address) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(address);
                None
            }
            None => None,
        }
    }

    /// Resolves `address` to a short host name, falling back to `address`.
    ///
    /// Blocks on the underlying lookup on a cache miss.
    pub fn resolve(&self, address: &str) -> String {
        if let Some(hit) = self.cached(address) {
            trace!("DNS cache hit for {}", address);
            return hit;
        }

        let value = match self.lookup.lookup_addr(address) {
            Ok(names) => match names.first() {
                Some(name) => short_name(name).to_string(),
                None => address.to_string(),
            },
            Err(e) => {
                debug!("Reverse lookup for {} failed: {}", address, e);
                address.to_string()
            }
        };

        let expires_at = self.clock.now().checked_add(self.ttl);
        self.lock().insert(
            address.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at,
            },
        );
        value
    }

    /// Reserves the lookup of `address` for the caller.
    ///
    /// Returns `None` while another [`PendingLookup`] for the same address is
    /// alive, so overlapping scrapes never block two threads on one name.
    pub fn claim(self: &Arc<Self>, address: &str) -> Option<PendingLookup> {
        if !self.lock_in_flight().insert(address.to_string()) {
            return None;
        }
        Some(PendingLookup {
            resolver: Arc::clone(self),
            address: address.to_string(),
        })
    }

    /// Number of lookups currently claimed.
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to look up one address, released on drop.
pub struct PendingLookup {
    resolver: Arc<AddressResolver>,
    address: String,
}

impl PendingLookup {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Runs the lookup and caches its answer. Blocks on a cache miss.
    pub fn resolve(self) -> String {
        self.resolver.resolve(&self.address)
    }
}

impl Drop for PendingLookup {
    fn drop(&mut self) {
        self.resolver.lock_in_flight().remove(&self.address);
    }
}

/// Leading label of a dotted name: `worker-7.cluster.internal` -> `worker-7`.
pub fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNames;

    impl ReverseLookup for NoNames {
        fn lookup_addr(&self, _address: &str) -> io::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("worker-7.cluster.internal."), "worker-7");
        assert_eq!(short_name("standalone"), "standalone");
        assert_eq!(short_name("10.1.2.3"), "10");
        assert_eq!(short_name(""), "");
    }

    #[test]
    fn test_empty_answer_falls_back_to_address() {
        let resolver =
            AddressResolver::with_parts(DEFAULT_CACHE_TTL, Arc::new(NoNames), Arc::new(SystemClock));
        assert_eq!(resolver.resolve("10.9.8.7"), "10.9.8.7");
        assert_eq!(resolver.cached("10.9.8.7").as_deref(), Some("10.9.8.7"));
    }

    #[test]
    fn test_system_lookup_rejects_non_ip() {
        let err = SystemLookup.lookup_addr("not-an-ip").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let resolver = AddressResolver::with_parts(
            Duration::from_secs(u64::MAX),
            Arc::new(NoNames),
            Arc::new(SystemClock),
        );
        assert_eq!(resolver.resolve("10.1.2.3"), "10.1.2.3");
        assert_eq!(resolver.purge_expired(), 0);
        assert_eq!(resolver.cached("10.1.2.3").as_deref(), Some("10.1.2.3"));
    }
}
