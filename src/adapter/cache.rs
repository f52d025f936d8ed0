//! Run-local cache shared by sibling adapters
//!
//! Lets adapters for the same provider perform a shared upstream check (e.g.
//! "is the booking frontend online?") once per run. Concurrent callers for
//! the same key wait for the first initializer instead of repeating it.

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a cached value may be reused
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age after which the value is recomputed
    pub ttl: Option<Duration>,
    /// Number of lookups (including the first) the value serves
    pub max_uses: Option<u32>,
}

impl CachePolicy {
    /// Reuse for the rest of the run
    pub fn run() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    created: Instant,
    uses: u32,
    policy: CachePolicy,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        let young = self.policy.ttl.map_or(true, |ttl| self.created.elapsed() < ttl);
        let unspent = self.policy.max_uses.map_or(true, |max| self.uses < max);
        young && unspent
    }
}

type Slot = Arc<Mutex<Option<Entry>>>;

/// Keyed, type-erased cache scoped to one run
#[derive(Default)]
pub struct RunCache {
    slots: DashMap<String, Slot>,
}

impl fmt::Debug for RunCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCache")
            .field("keys", &self.slots.len())
            .finish()
    }
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `init` to produce it.
    ///
    /// Only one initializer runs per key at a time. A failed initializer
    /// caches nothing, so the next caller tries again. A value of a different
    /// type under the same key is replaced.
    pub async fn get_or_try_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        init: F,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot: Slot = self.slots.entry(key.to_string()).or_default().clone();
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_mut() {
            if entry.is_fresh() {
                if let Ok(value) = Arc::clone(&entry.value).downcast::<T>() {
                    entry.uses += 1;
                    return Ok(value);
                }
            }
        }

        let value = Arc::new(init().await?);
        *guard = Some(Entry {
            value: value.clone(),
            created: Instant::now(),
            uses: 1,
            policy,
        });
        Ok(value)
    }

    /// Drop the value for `key`
    pub fn invalidate(&self, key: &str) {
        self.slots.remove(key);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
