//! Secret metadata and access-audit records.
//!
//! These are the records the cache actually carries: secret descriptions as
//! reported by the provider, and the audit events recorded against them.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Secret metadata as reported by the secret provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub arn: String,
    pub version: String,
    pub created_at: Timestamp,
    pub last_accessed: Timestamp,
}

/// One access-audit event recorded against a secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Provider-assigned event identifier.
    pub event_id: Uuid,
    pub user: String,
    pub event_name: String,
    pub event_source: String,
    pub event_time: Timestamp,
}

/// A secret joined with its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretReport {
    pub secret: Secret,
    pub access_log: Vec<AccessEvent>,
}

/// Newest event time in an audit trail, used to refresh `last_accessed`.
pub fn last_access_time(events: &[AccessEvent]) -> Option<Timestamp> {
    events.iter().map(|e| e.event_time).max()
}

/// Cache key derivation shared by every cache consumer.
///
/// Keys are flat strings namespaced by a prefix denoting the dataset, so the
/// same tier chain can hold secret metadata, audit trails, and ARN listings
/// side by side without collisions.
pub mod keys {
    /// Key for a secret's metadata, by ARN.
    pub fn for_secret(arn: &str) -> String {
        format!("secret:{}", arn)
    }

    /// Key for a secret's access log, by ARN.
    pub fn for_access_log(arn: &str) -> String {
        format!("access:{}", arn)
    }

    /// Key for the ARN list visible to an API credential.
    pub fn for_arn_list(public_key: &str) -> String {
        format!("arnlst:{}", public_key)
    }
}
