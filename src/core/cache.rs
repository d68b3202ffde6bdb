use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: usize = 1024;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    last_used: u64,
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    tick: u64,
}

impl<K: Eq + Hash, V> CacheState<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// In-memory TTL cache bounded by entry count.
///
/// Entries expire once `ttl` has elapsed since they were stored and are
/// dropped lazily on read. When the cache is full, expired entries are
/// purged first and then the least recently used entry is evicted.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<CacheState<K, V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
            })),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut state = self.inner.lock().await;
        let expired = match state.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() >= self.ttl,
            None => {
                debug!("Cache MISS for key: {:?}", key);
                return None;
            }
        };

        if expired {
            debug!("Cache entry expired for key: {:?}", key);
            state.entries.remove(key);
            return None;
        }

        let tick = state.next_tick();
        let entry = state.entries.get_mut(key)?;
        entry.last_used = tick;
        debug!("Cache HIT for key: {:?}", key);
        Some(entry.value.clone())
    }

    pub async fn put(&self, key: K, value: V) {
        let mut state = self.inner.lock().await;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let ttl = self.ttl;
            state.entries.retain(|_, e| e.stored_at.elapsed() < ttl);

            if state.entries.len() >= self.capacity {
                let victim = state
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    debug!("Cache EVICT for key: {:?}", victim);
                    state.entries.remove(&victim);
                }
            }
        }

        let tick = state.next_tick();
        debug!("Cache PUT for key: {:?}", key);
        state.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                last_used: tick,
            },
        );
    }

    pub async fn remove(&self, key: &K) {
        let mut state = self.inner.lock().await;
        state.entries.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.entries.clear();
        debug!("Cache CLEAR");
    }

    /// Number of stored entries, including ones that expired but were not read since.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}
