use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Cached<V> {
    value: V,
    expires_at: Instant,
}

/// permalink -> entity, entries live for `ttl`
///
/// no lock is ever held across an upstream call. Two misses on the same key both fetch and the
/// last insert wins, entities are the same either way
#[derive(Debug)]
pub struct MemoryCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, Cached<V>>>,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // a panic while holding the lock can't leave the map half written, so poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Cached<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Cached<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// a copy of the entry, expired entries count as misses even before the sweeper gets to them
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        self.read()
            .get(key)
            .filter(|cell| cell.expires_at > now)
            .map(|cell| cell.value.clone())
    }

    /// first live entry matching `predicate`, used for lookups by something other than the key
    pub fn find(&self, predicate: impl Fn(&V) -> bool) -> Option<V> {
        let now = Instant::now();

        self.read()
            .values()
            .find(|cell| cell.expires_at > now && predicate(&cell.value))
            .map(|cell| cell.value.clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.write().insert(key.into(), Cached { value, expires_at });
    }

    /// drops everything that expired, returns how many entries went away
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();

        let before = entries.len();
        entries.retain(|_, cell| cell.expires_at >= now);

        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// sweeps `cache` every `every` until the returned handle is aborted
pub fn spawn_sweeper<V>(cache: Arc<MemoryCache<V>>, every: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // the first tick fires right away, nothing to sweep yet
        interval.tick().await;

        loop {
            interval.tick().await;

            let removed = cache.sweep();
            if removed > 0 {
                debug!("{} cache: swept {} expired entries", cache.name(), removed);
            }
        }
    })
}
