//! Aircraft-ID TTL cache (§3, §11.3).
//!
//! Maps `(channel_freq_khz, ac_id) -> (icao_address, last_seen)`. Expiry is
//! swept inline inside `lookup()` whenever the wall-clock delta since the
//! last sweep exceeds `expiration_interval`, not by a dedicated background
//! thread — preserved this way because a sweep thread would change the
//! concurrency model (§5) to include a timer-driven writer on a structure
//! otherwise touched only from LPDU-logon-confirm and lookup call sites.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub type AircraftKey = (u32, u8);

#[derive(Debug, Clone, Copy)]
struct Entry {
    icao_address: u32,
    last_seen: Instant,
}

pub struct AircraftCache {
    ttl: Duration,
    sweep_interval: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    entries: HashMap<AircraftKey, Entry>,
    last_sweep: Instant,
}

impl AircraftCache {
    pub fn new(ttl_secs: u64, expiration_interval_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            sweep_interval: Duration::from_secs(expiration_interval_secs),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Record that `ac_id` on `channel_freq_khz` was confirmed to own
    /// `icao_address` (LPDU logon-confirm, §4.4).
    pub fn insert(&self, channel_freq_khz: u32, ac_id: u8, icao_address: u32) {
        let mut guard = self.inner.lock().unwrap();
        guard.entries.insert(
            (channel_freq_khz, ac_id),
            Entry {
                icao_address,
                last_seen: Instant::now(),
            },
        );
    }

    /// Look up the ICAO address for `(channel_freq_khz, ac_id)`. Sweeps
    /// expired entries first if the sweep interval has elapsed.
    pub fn lookup(&self, channel_freq_khz: u32, ac_id: u8) -> Option<u32> {
        let mut guard = self.inner.lock().unwrap();
        self.sweep_if_due(&mut guard);
        guard
            .entries
            .get(&(channel_freq_khz, ac_id))
            .map(|e| e.icao_address)
    }

    fn sweep_if_due(&self, guard: &mut Inner) {
        let now = Instant::now();
        if now.duration_since(guard.last_sweep) < self.sweep_interval {
            return;
        }
        let ttl = self.ttl;
        guard
            .entries
            .retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
        guard.last_sweep = now;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn insert_then_lookup_round_trips() {
        let cache = AircraftCache::new(600, 60);
        cache.insert(13_257, 0x2B, 0xD2CE48);
        assert_eq!(cache.lookup(13_257, 0x2B), Some(0xD2CE48));
    }

    #[test]
    fn unknown_key_returns_none() {
        let cache = AircraftCache::new(600, 60);
        assert_eq!(cache.lookup(13_257, 0x01), None);
    }

    #[test]
    fn expired_entry_is_swept_on_next_lookup_past_interval() {
        let cache = AircraftCache::new(0, 0);
        cache.insert(13_257, 0x2B, 0xD2CE48);
        sleep(Duration::from_millis(5));
        assert_eq!(cache.lookup(13_257, 0x2B), None);
        assert!(cache.is_empty());
    }
}
