//! Test doubles shared by the cache tier tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use arx_core::{CacheError, CacheResult};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::traits::{CacheStats, CacheTier};

/// In-memory stand-in for a downstream tier, with failure injection and
/// per-key read counting.
pub(crate) struct MockTier {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    get_counts: RwLock<HashMap<String, usize>>,
    fail_sets: AtomicBool,
    fail_gets: RwLock<HashSet<String>>,
}

impl MockTier {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            get_counts: RwLock::new(HashMap::new()),
            fail_sets: AtomicBool::new(false),
            fail_gets: RwLock::new(HashSet::new()),
        }
    }

    pub(crate) fn with_entries<K, V>(entries: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mock = Self::new();
        {
            let mut map = mock.entries.write().unwrap();
            for (key, payload) in entries {
                map.insert(key.as_ref().to_string(), payload.as_ref().to_vec());
            }
        }
        mock
    }

    /// Makes every subsequent `set` and `write_through` fail.
    pub(crate) fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `get` of `key` fail.
    pub(crate) fn fail_get(&self, key: &str) {
        self.fail_gets.write().unwrap().insert(key.to_string());
    }

    /// How many times `get` was called for `key`.
    pub(crate) fn get_count(&self, key: &str) -> usize {
        self.get_counts
            .read()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Current payload stored under `key`, if any.
    pub(crate) fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl CacheTier for MockTier {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        *self
            .get_counts
            .write()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;

        if self.fail_gets.read().unwrap().contains(key) {
            return Err(CacheError::Io {
                key: key.to_string(),
                source: io::Error::other("injected failure"),
            });
        }

        self.entries
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound {
                key: key.to_string(),
            })
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::Io {
                key: key.to_string(),
                source: io::Error::other("injected failure"),
            });
        }
        self.entries.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    async fn all_keys(&self) -> CacheResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn attach_layer(&self, _layer: Arc<dyn CacheTier>, _load: bool) -> CacheResult<()> {
        Ok(())
    }

    async fn activate_flush(&self, _interval: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn write_through(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.set(key, value).await
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats {
            hits: 0,
            misses: 0,
            entry_count: self.entries.read().unwrap().len() as u64,
            dirty_count: 0,
        })
    }
}

/// Single-entry stand-in whose `get` parks on a gate until
/// [`LatchedTier::release`] is called, for landing writes while a
/// fall-through read is in flight.
pub(crate) struct LatchedTier {
    key: String,
    payload: Vec<u8>,
    gate: Semaphore,
}

impl LatchedTier {
    pub(crate) fn holding(key: &str, payload: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            payload: payload.to_vec(),
            gate: Semaphore::new(0),
        }
    }

    /// Lets one parked `get` proceed.
    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl CacheTier for LatchedTier {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.gate.acquire().await.unwrap().forget();
        if key == self.key {
            Ok(self.payload.clone())
        } else {
            Err(CacheError::NotFound {
                key: key.to_string(),
            })
        }
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn all_keys(&self) -> CacheResult<Vec<String>> {
        Ok(vec![self.key.clone()])
    }

    async fn attach_layer(&self, _layer: Arc<dyn CacheTier>, _load: bool) -> CacheResult<()> {
        Ok(())
    }

    async fn activate_flush(&self, _interval: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn write_through(&self, _key: &str, _value: Vec<u8>) -> CacheResult<()> {
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats {
            hits: 0,
            misses: 0,
            entry_count: 1,
            dirty_count: 0,
        })
    }
}
