//! Sliding-window call admission, tracked independently per key.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_MAX_CALLS: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct LimiterState {
    calls: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl LimiterState {
    /// Drops every key whose newest call has left the window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.calls.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|t| now.duration_since(*t) < window)
        });
        self.last_sweep = now;
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<LimiterState>>,
    max_calls: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState {
                calls: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_calls,
            window,
        }
    }

    /// Records a call for `key` and returns true if fewer than `max_calls`
    /// calls were admitted for it during the trailing window. A rejected
    /// call is not recorded.
    ///
    /// At most once per window, keys with no call inside the window are
    /// dropped so that one-off keys do not accumulate.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if now.duration_since(state.last_sweep) >= self.window {
            let before = state.calls.len();
            state.sweep(now, self.window);
            debug!(
                dropped = before - state.calls.len(),
                "Swept idle rate limit keys"
            );
        }

        if let Some(timestamps) = state.calls.get_mut(key) {
            while timestamps
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                timestamps.pop_front();
            }
            if timestamps.is_empty() {
                state.calls.remove(key);
            }
        }

        let timestamps = state.calls.entry(key.to_string()).or_default();
        if timestamps.len() >= self.max_calls {
            debug!(key, count = timestamps.len(), "Rate limit reached");
            return false;
        }

        timestamps.push_back(now);
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALLS, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
impl RateLimiter {
    async fn recorded(&self, key: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(key)
            .map_or(0, VecDeque::len)
    }

    async fn tracked_keys(&self) -> usize {
        self.state.lock().await.calls.len()
    }
}
