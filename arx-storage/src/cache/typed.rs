//! Typed access over raw cache tiers.
//!
//! [`TypedCache`] wraps the entry tier of a chain and runs every payload
//! through an injected [`PayloadCodec`], so callers work with domain types
//! while the tiers keep storing opaque bytes.

use std::sync::Arc;

use arx_core::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::codec::{JsonCodec, PayloadCodec};
use super::traits::CacheTier;

/// Codec-aware facade over a tier chain.
pub struct TypedCache<C = JsonCodec> {
    tier: Arc<dyn CacheTier>,
    codec: C,
}

impl TypedCache<JsonCodec> {
    /// Typed cache speaking JSON, the format the disk tier persists.
    pub fn json(tier: Arc<dyn CacheTier>) -> Self {
        Self::with_codec(tier, JsonCodec)
    }
}

impl<C: PayloadCodec> TypedCache<C> {
    pub fn with_codec(tier: Arc<dyn CacheTier>, codec: C) -> Self {
        Self { tier, codec }
    }

    /// Entry tier of the chain, for raw byte access.
    pub fn tier(&self) -> &Arc<dyn CacheTier> {
        &self.tier
    }

    /// Fetches and decodes the value stored under `key`.
    ///
    /// A payload that exists but does not decode as `T` surfaces as
    /// [`CacheError::Decode`], not as a miss.
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        let payload = self.tier.get(key).await?;
        self.codec
            .decode(&payload)
            .map_err(|err| CacheError::Decode {
                key: key.to_string(),
                target: std::any::type_name::<T>(),
                reason: err.to_string(),
            })
    }

    /// Encodes `value` and stores it in the entry tier.
    pub async fn set_value<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let payload = self.encode(key, value)?;
        self.tier.set(key, payload).await
    }

    /// Encodes `value` and writes it through the whole chain.
    pub async fn write_value_through<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let payload = self.encode(key, value)?;
        self.tier.write_through(key, payload).await
    }

    fn encode<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<Vec<u8>> {
        self.codec.encode(value).map_err(|err| CacheError::Encode {
            key: key.to_string(),
            target: std::any::type_name::<T>(),
            reason: err.to_string(),
        })
    }
}

impl<C: Clone> Clone for TypedCache<C> {
    fn clone(&self) -> Self {
        Self {
            tier: Arc::clone(&self.tier),
            codec: self.codec.clone(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::disk::DiskTier;
    use crate::cache::memory::MemoryTier;
    use crate::cache::object_key;
    use arx_core::{keys, render_secret_report, AccessEvent, Secret, SecretReport};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_secret() -> Secret {
        Secret {
            name: "db-credentials".to_string(),
            arn: "arn:aws:secretsmanager:us-east-1:123456789012:secret:db".to_string(),
            version: "v1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            last_accessed: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
        }
    }

    fn sample_events() -> Vec<AccessEvent> {
        vec![AccessEvent {
            event_id: Uuid::now_v7(),
            user: "alice".to_string(),
            event_name: "GetSecretValue".to_string(),
            event_source: "secretsmanager.amazonaws.com".to_string(),
            event_time: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
        }]
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let tier: Arc<dyn CacheTier> = Arc::new(MemoryTier::default());
        let cache = TypedCache::json(tier);

        let secret = sample_secret();
        let key = keys::for_secret(&secret.arn);
        cache.set_value(&key, &secret).await.unwrap();

        let back: Secret = cache.get_value(&key).await.unwrap();
        assert_eq!(back, secret);
    }

    #[tokio::test]
    async fn test_get_value_missing_key_is_not_found() {
        let tier: Arc<dyn CacheTier> = Arc::new(MemoryTier::default());
        let cache = TypedCache::json(tier);

        let err = cache
            .get_value::<Secret>("secret:absent")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_value_on_garbage_payload_is_decode_error() {
        let tier: Arc<dyn CacheTier> = Arc::new(MemoryTier::default());
        tier.set("secret:a", b"not json".to_vec()).await.unwrap();

        let cache = TypedCache::json(Arc::clone(&tier));
        let err = cache.get_value::<Secret>("secret:a").await.unwrap_err();

        assert!(matches!(err, CacheError::Decode { .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_write_value_through_lands_in_every_tier() {
        let dir = TempDir::new().unwrap();
        let disk: Arc<dyn CacheTier> = Arc::new(DiskTier::new(dir.path()).unwrap());
        let hot = Arc::new(MemoryTier::default());
        hot.attach_layer(Arc::clone(&disk), false).await.unwrap();

        let cache = TypedCache::json(hot.clone());
        let secret = sample_secret();
        let key = keys::for_secret(&secret.arn);
        cache.write_value_through(&key, &secret).await.unwrap();

        assert!(!hot.is_dirty(&key).unwrap());
        let from_disk = disk.get(&key).await.unwrap();
        assert_eq!(from_disk, serde_json::to_vec(&secret).unwrap());
    }

    #[tokio::test]
    async fn test_full_chain_write_flush_restart_and_delete() {
        let dir = TempDir::new().unwrap();
        let secret = sample_secret();
        let events = sample_events();
        let secret_key = keys::for_secret(&secret.arn);
        let log_key = keys::for_access_log(&secret.arn);

        // First process lifetime: write, let the synchronizer persist.
        {
            let disk: Arc<dyn CacheTier> = Arc::new(DiskTier::new(dir.path()).unwrap());
            let hot = Arc::new(MemoryTier::default());
            hot.attach_layer(disk, true).await.unwrap();
            hot.activate_flush(Duration::from_millis(20)).await.unwrap();

            let cache = TypedCache::json(hot.clone());
            cache.set_value(&secret_key, &secret).await.unwrap();
            cache.set_value(&log_key, &events).await.unwrap();

            tokio::time::sleep(Duration::from_millis(120)).await;
            assert!(!hot.is_dirty(&secret_key).unwrap());
            assert!(!hot.is_dirty(&log_key).unwrap());

            // The durable copy is byte-for-byte the JSON encoding.
            let object = fs::read(dir.path().join(object_key::encode(&secret_key))).unwrap();
            assert_eq!(object, serde_json::to_vec(&secret).unwrap());

            let snapshot = hot.shutdown_flush().await.unwrap();
            assert!(snapshot.entries_flushed >= 2);
        }

        // Second lifetime: the disk tier still holds everything.
        let disk = Arc::new(DiskTier::new(dir.path()).unwrap());
        let hot = Arc::new(MemoryTier::default());
        hot.attach_layer(disk.clone(), true).await.unwrap();

        let cache = TypedCache::json(hot.clone());
        let restored: Secret = cache.get_value(&secret_key).await.unwrap();
        assert_eq!(restored, secret);
        let restored_events: Vec<AccessEvent> = cache.get_value(&log_key).await.unwrap();
        assert_eq!(restored_events, events);

        let report = render_secret_report(&SecretReport {
            secret: restored,
            access_log: restored_events,
        });
        assert!(report.contains("GetSecretValue"));
        assert!(report.contains("alice"));

        // Deletes do not propagate: each tier is cleared explicitly, and
        // only then is the key gone from the chain.
        hot.delete(&secret_key).await.unwrap();
        disk.delete(&secret_key).await.unwrap();
        let err = cache.get_value::<Secret>(&secret_key).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
