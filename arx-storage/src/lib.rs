//! ARX Storage - Layered Cache Tiers
//!
//! The caching core behind the secret-access reporting service: an in-memory
//! hot tier chained over a file-backed durable tier, reconciled by a
//! background write-back task. The provider wrapper and serving layer live
//! elsewhere and talk to this crate through [`CacheTier`] and [`TypedCache`].

pub mod cache;

pub use cache::{
    CacheStats, CacheTier, CodecError, DiskTier, FlushMetrics, FlushSnapshot, JsonCodec,
    MemoryTier, MemoryTierConfig, PayloadCodec, TypedCache,
};
