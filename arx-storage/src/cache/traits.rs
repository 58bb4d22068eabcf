//! Cache tier contract and usage statistics.

use std::sync::Arc;
use std::time::Duration;

use arx_core::CacheResult;
use async_trait::async_trait;

/// Contract implemented by every cache tier.
///
/// Tiers chain linearly: each tier holds at most one downstream layer, bound
/// exactly once, and the chain terminates at a tier with none. Values are
/// opaque byte payloads; interpretation belongs to the typed accessor.
///
/// # Miss Semantics
///
/// A key absent from a tier and from every layer below it yields
/// `CacheError::NotFound`. A value served by a downstream layer is promoted
/// into the tier that missed, stored clean, as a side effect of `get`.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Look up a key, consulting the attached layer on a local miss.
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Store a value in this tier only. Never touches downstream layers.
    async fn set(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Remove this tier's copy of a key. Does not propagate downstream.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Keys currently resident in this tier only.
    async fn all_keys(&self) -> CacheResult<Vec<String>>;

    /// Bind the downstream layer exactly once. With `load` set, every key the
    /// layer currently holds is pulled into this tier before the call
    /// returns.
    async fn attach_layer(&self, layer: Arc<dyn CacheTier>, load: bool) -> CacheResult<()>;

    /// Start periodic write-back of locally modified entries to the attached
    /// layer. Fails with `NoLayer` when nothing is attached; tiers without
    /// local modifications to push accept the call and do nothing. The
    /// interval must be non-zero.
    async fn activate_flush(&self, interval: Duration) -> CacheResult<()>;

    /// Store a value in this tier, then synchronously hand it down the rest
    /// of the chain. A tier with no layer attached stores locally and stops.
    async fn write_through(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;

    /// Usage statistics for this tier.
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Statistics about cache tier usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of lookups served from this tier.
    pub hits: u64,
    /// Number of lookups that missed this tier locally.
    pub misses: u64,
    /// Number of entries currently resident.
    pub entry_count: u64,
    /// Number of entries carrying writes not yet pushed downstream.
    pub dirty_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
