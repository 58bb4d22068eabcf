//! In-memory hot tier.
//!
//! Entries live in a single map behind a mutex and expire after a
//! configurable TTL. Writes land here first and are marked dirty until the
//! background synchronizer pushes them to the attached downstream tier.
//! Dirty entries are exempt from TTL eviction until they have been flushed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use arx_core::{CacheError, CacheResult};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

use super::flush::{FlushControl, FlushSnapshot};
use super::traits::{CacheStats, CacheTier};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the in-memory tier.
#[derive(Debug, Clone)]
pub struct MemoryTierConfig {
    /// How long a clean entry stays resident before it expires.
    pub entry_ttl: Duration,
    /// How often dirty entries are pushed downstream. The composition root
    /// passes this to [`CacheTier::activate_flush`].
    pub flush_interval: Duration,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(300),
            flush_interval: Duration::from_secs(60),
        }
    }
}

impl MemoryTierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry_ttl(mut self, entry_ttl: Duration) -> Self {
        self.entry_ttl = entry_ttl;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable. A zero flush interval is
    /// ignored the same way; the flush timer needs a non-zero period.
    ///
    /// Recognized variables:
    /// - `ARX_CACHE_TTL_SECS`
    /// - `ARX_FLUSH_INTERVAL_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ARX_CACHE_TTL_SECS") {
            if let Ok(secs) = raw.parse::<u64>() {
                config.entry_ttl = Duration::from_secs(secs);
            }
        }
        if let Ok(raw) = std::env::var("ARX_FLUSH_INTERVAL_SECS") {
            if let Ok(secs) = raw.parse::<u64>() {
                if secs > 0 {
                    config.flush_interval = Duration::from_secs(secs);
                }
            }
        }

        config
    }
}

// ============================================================================
// TIER STATE
// ============================================================================

struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
    generation: u64,
    dirty: bool,
}

impl Entry {
    /// Dirty entries stay live regardless of TTL until they are flushed.
    fn is_live(&self, now: Instant) -> bool {
        self.dirty || now < self.expires_at
    }
}

/// A dirty entry captured for flushing, with the generation it was read at.
pub(crate) struct DirtyEntry {
    pub(crate) key: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) generation: u64,
}

/// Resident entries plus the write generation counter.
pub(crate) struct TierState {
    entries: HashMap<String, Entry>,
    next_generation: u64,
}

impl TierState {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Inserts an entry and returns the generation assigned to it.
    pub(crate) fn insert(
        &mut self,
        key: String,
        payload: Vec<u8>,
        ttl: Duration,
        dirty: bool,
    ) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            key,
            Entry {
                payload,
                expires_at: Instant::now() + ttl,
                generation,
                dirty,
            },
        );
        generation
    }

    /// Clears the dirty flag only if the entry still carries `generation`.
    /// An entry overwritten since then keeps its flag.
    pub(crate) fn clear_dirty_if(&mut self, key: &str, generation: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.generation == generation {
                entry.dirty = false;
            }
        }
    }

    pub(crate) fn dirty_snapshot(&self) -> Vec<DirtyEntry> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, entry)| DirtyEntry {
                key: key.clone(),
                payload: entry.payload.clone(),
                generation: entry.generation,
            })
            .collect()
    }

    /// Drops expired entries and returns how many were removed.
    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

// ============================================================================
// HOT TIER
// ============================================================================

/// In-memory cache tier.
///
/// Reads serve from the resident map and fall through to the attached
/// downstream tier on a miss, promoting what they find. Writes stay local
/// and are marked dirty until the flush task (or a write-through) lands
/// them downstream.
pub struct MemoryTier {
    state: Arc<Mutex<TierState>>,
    layer: OnceCell<Arc<dyn CacheTier>>,
    flush: OnceCell<FlushControl>,
    config: MemoryTierConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryTier {
    pub fn new(config: MemoryTierConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(TierState::new())),
            layer: OnceCell::new(),
            flush: OnceCell::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Shorthand for a tier that only overrides the entry TTL.
    pub fn with_ttl(entry_ttl: Duration) -> Self {
        Self::new(MemoryTierConfig::new().with_entry_ttl(entry_ttl))
    }

    pub fn config(&self) -> &MemoryTierConfig {
        &self.config
    }

    fn lock_state(&self) -> CacheResult<MutexGuard<'_, TierState>> {
        self.state.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Whether `key` is resident with a write not yet pushed downstream.
    pub fn is_dirty(&self, key: &str) -> CacheResult<bool> {
        let state = self.lock_state()?;
        Ok(state.entries.get(key).map(|e| e.dirty).unwrap_or(false))
    }

    /// Keys carrying writes not yet pushed downstream, sorted.
    pub fn dirty_keys(&self) -> CacheResult<Vec<String>> {
        let state = self.lock_state()?;
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Metrics of the flush task, if one was activated.
    pub fn flush_metrics(&self) -> Option<FlushSnapshot> {
        self.flush.get().map(FlushControl::snapshot)
    }

    /// Stops the flush task and returns its final metrics. Returns `None`
    /// when no flush task was ever activated.
    pub async fn shutdown_flush(&self) -> Option<FlushSnapshot> {
        match self.flush.get() {
            Some(control) => control.stop().await,
            None => None,
        }
    }

    async fn warm_up(&self, layer: &dyn CacheTier) -> CacheResult<usize> {
        let keys = match layer.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "Could not list downstream keys for warm-up");
                return Ok(0);
            }
        };

        let mut loaded = 0usize;
        for key in keys {
            match layer.get(&key).await {
                Ok(payload) => {
                    let ttl = self.config.entry_ttl;
                    let mut state = self.lock_state()?;
                    let now = Instant::now();
                    // A live resident entry may carry an unflushed write and
                    // wins over the downstream copy, as on promotion.
                    let resident = state
                        .entries
                        .get(&key)
                        .map(|entry| entry.is_live(now))
                        .unwrap_or(false);
                    if resident {
                        continue;
                    }
                    state.insert(key, payload, ttl, false);
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Skipping key during warm-up");
                }
            }
        }

        tracing::info!(loaded, "Hot tier warm-up complete");
        Ok(loaded)
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(MemoryTierConfig::default())
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        {
            let mut state = self.lock_state()?;
            let now = Instant::now();
            let expired = match state.entries.get(key) {
                Some(entry) if entry.is_live(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.payload.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                state.entries.remove(key);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let layer = match self.layer.get() {
            Some(layer) => Arc::clone(layer),
            None => {
                return Err(CacheError::NotFound {
                    key: key.to_string(),
                })
            }
        };
        let payload = layer.get(key).await?;

        // Promote clean. A write that landed while the lock was released
        // wins over the promoted copy.
        let mut state = self.lock_state()?;
        let now = Instant::now();
        if let Some(entry) = state.entries.get(key) {
            if entry.is_live(now) {
                return Ok(entry.payload.clone());
            }
        }
        state.insert(
            key.to_string(),
            payload.clone(),
            self.config.entry_ttl,
            false,
        );
        Ok(payload)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut state = self.lock_state()?;
        state.insert(key.to_string(), value, self.config.entry_ttl, true);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut state = self.lock_state()?;
        state.entries.remove(key);
        Ok(())
    }

    async fn all_keys(&self) -> CacheResult<Vec<String>> {
        let state = self.lock_state()?;
        let now = Instant::now();
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn attach_layer(&self, layer: Arc<dyn CacheTier>, load: bool) -> CacheResult<()> {
        if self.layer.set(Arc::clone(&layer)).is_err() {
            return Err(CacheError::LayerAlreadyAttached);
        }
        tracing::info!(load, "Downstream layer attached to hot tier");

        if load {
            self.warm_up(layer.as_ref()).await?;
        }
        Ok(())
    }

    async fn activate_flush(&self, interval: Duration) -> CacheResult<()> {
        let layer = match self.layer.get() {
            Some(layer) => Arc::clone(layer),
            None => return Err(CacheError::NoLayer),
        };

        let control = FlushControl::spawn(Arc::clone(&self.state), layer, interval);
        if let Err(control) = self.flush.set(control) {
            // Lost the activation race; tear the extra task down.
            let _ = control.stop().await;
            return Err(CacheError::FlushAlreadyActive);
        }
        Ok(())
    }

    async fn write_through(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let generation = {
            let mut state = self.lock_state()?;
            state.insert(key.to_string(), value.clone(), self.config.entry_ttl, true)
        };

        let layer = match self.layer.get() {
            Some(layer) => Arc::clone(layer),
            None => return Ok(()),
        };
        layer.write_through(key, value).await?;

        let mut state = self.lock_state()?;
        state.clear_dirty_if(key, generation);
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let state = self.lock_state()?;
        let now = Instant::now();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: state.entries.values().filter(|e| e.is_live(now)).count() as u64,
            dirty_count: state.entries.values().filter(|e| e.dirty).count() as u64,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
