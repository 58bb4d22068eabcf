//! ARX Core - Shared Types
//!
//! Pure data structures with no I/O. The cache tiers, the provider wrapper,
//! and the serving layer all depend on this crate and nothing below it.

pub mod error;
pub mod report;
pub mod secret;

pub use error::{CacheError, CacheResult};
pub use report::render_secret_report;
pub use secret::{keys, last_access_time, AccessEvent, Secret, SecretReport};

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
