//! In-memory result cache: TTL expiry plus least-recently-used eviction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    inserted: Instant,
    last_used: u64,
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    tick: u64,
}

pub struct ResultCache<V> {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<V>>,
}

/// Hex SHA-256 of `method ‖ 0x1f ‖ text`.
pub fn cache_key(method: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                tick: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.map.get_mut(key) {
            Some(e) if e.inserted.elapsed() < self.ttl => {
                e.last_used = tick;
                counter!("sentiment_cache_hits_total").increment(1);
                return Some(e.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.map.remove(key);
        }
        counter!("sentiment_cache_misses_total").increment(1);
        None
    }

    pub fn insert(&self, key: String, value: V) {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.map.contains_key(&key) && inner.map.len() >= self.capacity {
            let ttl = self.ttl;
            inner.map.retain(|_, e| e.inserted.elapsed() < ttl);
            if inner.map.len() >= self.capacity {
                let oldest = inner
                    .map
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                if let Some(k) = oldest {
                    inner.map.remove(&k);
                }
            }
        }
        inner.map.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                last_used: tick,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
