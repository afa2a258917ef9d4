//! Small expiring key/value store in front of upstream calls.
//!
//! Expiry is lazy: a stale entry is removed the next time it is looked up,
//! there is no background sweep. There is also no capacity bound, so keys
//! must be derived from bounded inputs (the client keys on a hash of the
//! request URL built from selection names, never from free text).

use std::collections::HashMap;

/// Default entry lifetime in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A cached value with the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<T> {
    pub data: T,
    /// Unix timestamp in milliseconds when the entry was stored.
    pub timestamp_ms: u64,
    /// Lifetime in seconds.
    pub timeout_secs: u64,
}

impl<T> CacheItem<T> {
    /// Valid iff `now - timestamp <= timeout * 1000`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) <= self.timeout_secs.saturating_mul(1000)
    }
}

/// Time-boxed memoization keyed by an opaque string.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    items: HashMap<String, CacheItem<T>>,
    timeout_secs: u64,
}

impl<T: Clone> Cache<T> {
    /// Create a cache whose entries live for `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            items: HashMap::new(),
            timeout_secs,
        }
    }

    /// The lifetime applied by [`Cache::set`].
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// True iff an unexpired entry exists. Stale entries are removed.
    pub fn has(&mut self, key: &str) -> bool {
        self.has_at(key, now_ms())
    }

    /// The cached data, if present and unexpired.
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.get_at(key, now_ms())
    }

    /// Insert or overwrite. An empty key is ignored.
    pub fn set(&mut self, key: &str, data: T) {
        self.set_at(key, data, now_ms());
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_at(&mut self, key: &str, now_ms: u64) -> bool {
        match self.items.get(key) {
            Some(item) if item.is_valid_at(now_ms) => true,
            Some(_) => {
                self.items.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn get_at(&mut self, key: &str, now_ms: u64) -> Option<T> {
        if self.has_at(key, now_ms) {
            self.items.get(key).map(|item| item.data.clone())
        } else {
            None
        }
    }

    pub fn set_at(&mut self, key: &str, data: T, now_ms: u64) {
        if key.is_empty() {
            return;
        }
        self.items.insert(
            key.to_string(),
            CacheItem {
                data,
                timestamp_ms: now_ms,
                timeout_secs: self.timeout_secs,
            },
        );
    }
}

impl<T: Clone> Default for Cache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
