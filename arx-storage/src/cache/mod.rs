//! Layered write-back cache.
//!
//! Two tiers share one contract: [`MemoryTier`] holds hot entries in a
//! TTL-bounded map and marks which keys carry writes the next tier has not
//! seen yet; [`DiskTier`] persists one object per key under a root directory
//! and rebuilds its key manifest from a directory listing at startup.
//!
//! Tiers chain linearly through [`CacheTier::attach_layer`]. Reads fall
//! through the chain on a miss and promote the value upward; writes stay in
//! the tier they land in until the background flush task or an explicit
//! [`CacheTier::write_through`] pushes them down.
//!
//! # Example
//!
//! ```ignore
//! let disk = Arc::new(DiskTier::new("./persist-cache")?);
//! let hot = Arc::new(MemoryTier::new(MemoryTierConfig::default()));
//! hot.attach_layer(disk, true).await?;
//! hot.activate_flush(Duration::from_secs(60)).await?;
//!
//! let cache = TypedCache::json(hot);
//! cache.set_value(&keys::for_secret(arn), &secret).await?;
//! ```

pub mod codec;
pub mod disk;
pub mod flush;
pub mod memory;
pub mod object_key;
pub mod traits;
pub mod typed;

#[cfg(test)]
pub(crate) mod test_util;

pub use codec::{CodecError, JsonCodec, PayloadCodec};
pub use disk::DiskTier;
pub use flush::{FlushMetrics, FlushSnapshot};
pub use memory::{MemoryTier, MemoryTierConfig};
pub use traits::{CacheStats, CacheTier};
pub use typed::TypedCache;
